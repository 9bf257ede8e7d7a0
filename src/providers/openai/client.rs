use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use reqwest_eventsource::RequestBuilderExt;
use reqwest_eventsource::retry::Never;
use serde_json::Value;

use crate::config::{UpstreamConfig, UpstreamType};
use crate::error::GatewayError;
use crate::http_client::client_for_upstream;
use crate::model::ChatRole;
use crate::providers::streaming::{DeltaStream, delta_stream};
use crate::providers::{ChatBackend, UpstreamReply};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, UpstreamMessage, chat_role};

pub struct OpenAIBackend {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl OpenAIBackend {
    pub fn new(config: UpstreamConfig) -> Result<Self, GatewayError> {
        let client = client_for_upstream(&config)?;
        if config.api_key.is_none() {
            tracing::warn!("No upstream API key configured; requests are sent unauthenticated");
        }
        Ok(Self { client, config })
    }

    fn request(&self, messages: Vec<UpstreamMessage>, stream: bool) -> RequestBuilder {
        let body = ChatCompletionRequest {
            model: match self.config.api_type {
                UpstreamType::OpenAI => Some(self.config.model.clone()),
                UpstreamType::Azure => None,
            },
            messages,
            stream,
        };

        let builder = self
            .client
            .post(self.config.chat_completions_url())
            .header("Content-Type", "application/json")
            .json(&body);

        match (&self.config.api_key, self.config.api_type) {
            (Some(key), UpstreamType::OpenAI) => builder.bearer_auth(key),
            (Some(key), UpstreamType::Azure) => builder.header("api-key", key),
            (None, _) => builder,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAIBackend {
    async fn complete(&self, messages: Vec<UpstreamMessage>) -> Result<UpstreamReply, GatewayError> {
        let response = self
            .request(messages, false)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Upstream(format!("{}: {}", status, body.trim())));
        }
        parse_completion(&body)
    }

    async fn stream(&self, messages: Vec<UpstreamMessage>) -> Result<DeltaStream, GatewayError> {
        let mut es = self
            .request(messages, true)
            .header("Accept", "text/event-stream")
            .eventsource()
            .map_err(|e| GatewayError::Upstream(format!("Failed to open eventsource: {}", e)))?;
        // 重试策略交给调用方
        es.set_retry_policy(Box::new(Never));
        Ok(delta_stream(es))
    }
}

/// Reads the first choice of a completion body.
///
/// Bodies that do not match the typed response (vendor variations) are read
/// leniently from `choices[0].message`.
pub fn parse_completion(body: &str) -> Result<UpstreamReply, GatewayError> {
    if let Ok(response) = serde_json::from_str::<ChatCompletionResponse>(body) {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Upstream("completion has no choices".into()))?;
        return Ok(UpstreamReply {
            role: Some(chat_role(&choice.message.role)),
            content: choice.message.content.unwrap_or_default(),
        });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::Upstream(format!("invalid completion body: {}", e)))?;
    let message = value
        .pointer("/choices/0/message")
        .and_then(Value::as_object)
        .ok_or_else(|| GatewayError::Upstream("completion has no choices".into()))?;
    Ok(UpstreamReply {
        role: message
            .get("role")
            .and_then(Value::as_str)
            .map(|r| ChatRole::from_tag(r).unwrap_or(ChatRole::Assistant)),
        content: message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
