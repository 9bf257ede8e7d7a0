use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;

use crate::error::GatewayError;
use crate::model::{ChatRequest, decode_value};
use crate::server::multipart::{
    DEFAULT_FILE_CONTENT_TYPE, FilePart, JSON_PART, MultipartSubmission,
};

/// Chat request read from either an `application/json` body or a
/// `multipart/form-data` body with a `json` part plus file parts.
#[derive(Debug)]
pub struct ChatPayload(pub ChatRequest);

impl<S> FromRequest<S> for ChatPayload
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match media_type(&content_type).as_str() {
            "application/json" => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|e| body_error(e.status(), e.body_text()))?;
                let value: serde_json::Value = serde_json::from_slice(&body)?;
                Ok(ChatPayload(decode_value(&value)?))
            }
            "multipart/form-data" => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| body_error(e.status(), e.body_text()))?;
                let submission = collect_parts(multipart).await?;
                Ok(ChatPayload(submission.reconstruct()?))
            }
            _ if content_type.is_empty() => {
                Err(GatewayError::UnsupportedMediaType("missing content type".into()))
            }
            _ => Err(GatewayError::UnsupportedMediaType(content_type)),
        }
    }
}

/// Keeps "too large" apart from malformed bodies; `DefaultBodyLimit` reports 413.
fn body_error(status: StatusCode, message: String) -> GatewayError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge(message)
    } else {
        GatewayError::BadRequest(message)
    }
}

/// `type/subtype` without parameters, lowercased.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

async fn collect_parts(mut multipart: Multipart) -> Result<MultipartSubmission, GatewayError> {
    let mut submission = MultipartSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        body_error(e.status(), format!("Failed to parse multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_FILE_CONTENT_TYPE)
            .to_string();
        let data = field.bytes().await.map_err(|e| {
            body_error(e.status(), format!("Failed to read part '{}': {}", name, e))
        })?;

        if name == JSON_PART {
            if submission.json.is_some() {
                return Err(GatewayError::BadRequest("duplicate 'json' part".into()));
            }
            submission.json = Some(data);
        } else {
            submission.files.push(FilePart {
                name,
                content_type,
                data,
            });
        }
    }

    tracing::debug!(files = submission.files.len(), "Collected multipart chat submission");
    Ok(submission)
}
