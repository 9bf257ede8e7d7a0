use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;

use crate::error::GatewayError;
use crate::model::ChatRole;

use super::UpstreamDelta;
use super::openai::types::{ChatCompletionStreamResponse, chat_role};

/// 上游增量流；drop 即停止读取上游
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<UpstreamDelta, GatewayError>> + Send>>;

/// Parses one `data:` payload of a chat completion stream.
///
/// Returns `None` for chunks without choices (Azure content-filter preambles,
/// trailing usage chunks) and for payloads that are not JSON at all.
pub fn parse_stream_chunk(data: &str) -> Option<UpstreamDelta> {
    // Primary: typed parse
    if let Ok(chunk) = serde_json::from_str::<ChatCompletionStreamResponse>(data) {
        let choice = chunk.choices.into_iter().next()?;
        return Some(UpstreamDelta {
            role: choice.delta.role.as_ref().map(chat_role),
            content: choice.delta.content,
        });
    }

    // Fallback: Value parse (tolerate vendor extensions)
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Skipping unparseable stream chunk: {}", e);
            return None;
        }
    };
    let delta = v.pointer("/choices/0/delta")?;
    Some(UpstreamDelta {
        role: delta
            .get("role")
            .and_then(Value::as_str)
            .map(|r| ChatRole::from_tag(r).unwrap_or(ChatRole::Assistant)),
        content: delta
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Turns an upstream event source into a pull-driven delta stream.
///
/// Ends on `[DONE]` or when the upstream closes the connection. A failure is
/// yielded once as the last item.
pub fn delta_stream(es: EventSource) -> DeltaStream {
    Box::pin(futures_util::stream::unfold(Some(es), |state| async move {
        let mut es = state?;
        loop {
            match es.next().await {
                None => return None,
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(m))) => {
                    if m.data.trim() == "[DONE]" {
                        es.close();
                        return None;
                    }
                    if let Some(delta) = parse_stream_chunk(&m.data) {
                        return Some((Ok(delta), Some(es)));
                    }
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) => return None,
                Some(Err(e)) => {
                    es.close();
                    tracing::error!("Stream error: {}", e);
                    return Some((Err(stream_error(e).await), None));
                }
            }
        }
    }))
}

async fn stream_error(err: reqwest_eventsource::Error) -> GatewayError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            GatewayError::Upstream(format!("{}: {}", status, body.trim()))
        }
        reqwest_eventsource::Error::Transport(e) => GatewayError::Http(e),
        other => GatewayError::Upstream(other.to_string()),
    }
}
