pub mod client;
pub mod types;

pub use client::OpenAIBackend;
pub use types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatCompletionStreamResponse, ContentPart,
    ImageUrl, UpstreamContent, UpstreamMessage,
};
