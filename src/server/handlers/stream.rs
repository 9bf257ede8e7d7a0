use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::model::codec::Record;
use crate::model::{ChatMessage, ChatRole, encode_value};
use crate::providers::{DeltaStream, UpstreamDelta};
use crate::server::payload::ChatPayload;
use crate::server::relay::{delta_from_upstream, to_upstream_messages};
use crate::server::request_logging::log_chat_request;
use crate::server::session::Session;
use crate::server::AppState;

const ROUTE: &str = "/api/chat/stream";
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

enum Phase {
    Streaming(DeltaStream),
    Failed(GatewayError),
    Done,
}

/// Per-response bookkeeping carried between polls of the body stream.
struct Relay {
    app_state: Arc<AppState>,
    session: Option<Session>,
    session_id: String,
    start_time: DateTime<Utc>,
    role: Option<ChatRole>,
    reply: String,
}

impl Relay {
    fn line_for(&mut self, delta: UpstreamDelta) -> Result<Bytes, GatewayError> {
        if self.role.is_none() {
            self.role = delta.role;
        }
        if let Some(content) = &delta.content {
            self.reply.push_str(content);
        }
        let completion = delta_from_upstream(delta, Some(self.session_id.clone().into()));
        Ok(ndjson_line(&completion)?)
    }

    fn error_line(&self, e: &GatewayError) -> Bytes {
        log_chat_request(ROUTE, &self.session_id, self.start_time, Some(e));
        ndjson_line(&e.to_error_response()).unwrap_or_else(|encode_err| {
            tracing::error!("Failed to encode stream error: {}", encode_err);
            Bytes::from_static(b"{\"error\":{\"code\":\"internal_error\",\"message\":\"stream failed\"}}\r\n")
        })
    }

    async fn finish(&mut self) {
        if let Some(session) = self.session.take() {
            let reply = ChatMessage::new(
                self.role.unwrap_or(ChatRole::Assistant),
                std::mem::take(&mut self.reply),
            );
            session.finish(self.app_state.sessions.as_ref(), reply).await;
        }
        log_chat_request(ROUTE, &self.session_id, self.start_time, None);
    }
}

fn ndjson_line<R: Record>(record: &R) -> Result<Bytes, crate::model::CodecError> {
    let mut line = encode_value(record)?.to_string();
    line.push_str("\r\n");
    Ok(Bytes::from(line))
}

/// Streams one encoded `CompletionDelta` per line. Upstream failures become a
/// final error line; the upstream is read only as fast as the client reads.
pub async fn process_streaming_message(
    State(app_state): State<Arc<AppState>>,
    ChatPayload(request): ChatPayload,
) -> Result<Response, GatewayError> {
    let start_time = Utc::now();
    let session = Session::prepare(
        app_state.sessions.as_ref(),
        &app_state.config.chat.system_prompt,
        request,
    )
    .await;

    let phase = match app_state
        .backend
        .stream(to_upstream_messages(&session.messages))
        .await
    {
        Ok(deltas) => Phase::Streaming(deltas),
        Err(e) => Phase::Failed(e),
    };

    let relay = Relay {
        app_state,
        session_id: session.id.clone(),
        session: Some(session),
        start_time,
        role: None,
        reply: String::new(),
    };

    let body = futures_util::stream::unfold((phase, relay), |(phase, mut relay)| async move {
        match phase {
            Phase::Done => None,
            Phase::Failed(e) => {
                let line = relay.error_line(&e);
                Some((line, (Phase::Done, relay)))
            }
            Phase::Streaming(mut deltas) => match deltas.next().await {
                Some(Ok(delta)) => match relay.line_for(delta) {
                    Ok(line) => Some((line, (Phase::Streaming(deltas), relay))),
                    Err(e) => {
                        let line = relay.error_line(&e);
                        Some((line, (Phase::Done, relay)))
                    }
                },
                Some(Err(e)) => {
                    let line = relay.error_line(&e);
                    Some((line, (Phase::Done, relay)))
                }
                None => {
                    relay.finish().await;
                    None
                }
            },
        }
    })
    .map(Ok::<_, Infallible>);

    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(body),
    )
        .into_response())
}
