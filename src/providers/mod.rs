pub mod openai;
pub mod streaming;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::model::ChatRole;

pub use openai::{OpenAIBackend, UpstreamMessage};
pub use streaming::DeltaStream;

/// Final assistant message of a non-streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub role: Option<ChatRole>,
    pub content: String,
}

/// One streamed increment from the upstream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpstreamDelta {
    pub role: Option<ChatRole>,
    pub content: Option<String>,
}

/// 上游补全服务抽象（OpenAI / Azure OpenAI，测试中可替换为 mock）
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, messages: Vec<UpstreamMessage>) -> Result<UpstreamReply, GatewayError>;

    /// Dropping the returned stream stops reading from the upstream.
    async fn stream(&self, messages: Vec<UpstreamMessage>) -> Result<DeltaStream, GatewayError>;
}
