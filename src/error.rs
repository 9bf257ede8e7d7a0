use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::model::{CodecError, ErrorResponse, encode_value};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("multipart body has no part named 'json'")]
    MissingJsonPart,

    #[error("invalid file part name '{0}', expected messages[<i>].files[<j>]")]
    InvalidFilePartName(String),

    #[error("file part '{part}' refers to message {index}, but the request has {len} messages")]
    InvalidMessageIndex {
        part: String,
        index: usize,
        len: usize,
    },

    #[error("file part '{part}' is out of order: expected file index {expected}")]
    InvalidFileIndex { part: String, expected: usize },

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Stable error code written into `error.code` of the response body.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Codec(CodecError::InvalidEnumValue { .. }) => "invalid_enum_value",
            GatewayError::Codec(_) => "schema_error",
            GatewayError::MissingJsonPart => "missing_json_part",
            GatewayError::InvalidFilePartName(_) => "invalid_file_part_name",
            GatewayError::InvalidMessageIndex { .. } => "invalid_message_index",
            GatewayError::InvalidFileIndex { .. } => "invalid_file_index",
            GatewayError::UnsupportedMediaType(_) => "unsupported_media_type",
            GatewayError::PayloadTooLarge(_) => "payload_too_large",
            GatewayError::BadRequest(_) | GatewayError::Json(_) => "bad_request",
            GatewayError::Upstream(_) | GatewayError::Http(_) => "upstream_error",
            GatewayError::Io(_) | GatewayError::Config(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Upstream(_) | GatewayError::Http(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Io(_) | GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::warn!(code = self.code(), "{}", self);
        }
        match encode_value(&self.to_error_response()) {
            Ok(body) => (status, Json(body)).into_response(),
            Err(e) => {
                tracing::error!("Failed to encode error response: {}", e);
                status.into_response()
            }
        }
    }
}
