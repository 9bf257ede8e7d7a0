use serde::Serialize;

// 响应类型直接对齐 async-openai
pub use async_openai::types::{
    CreateChatCompletionResponse as ChatCompletionResponse,
    CreateChatCompletionStreamResponse as ChatCompletionStreamResponse, Role,
};

use crate::model::ChatRole;

// 请求体沿用本地定义：只需要 messages/model/stream 三个字段
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Omitted for Azure, where the deployment in the URL selects the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<UpstreamMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamMessage {
    pub role: String,
    pub content: UpstreamContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Tool and function roles have no counterpart in the chat protocol.
pub fn chat_role(role: &Role) -> ChatRole {
    match role {
        Role::System => ChatRole::System,
        Role::User => ChatRole::User,
        _ => ChatRole::Assistant,
    }
}
