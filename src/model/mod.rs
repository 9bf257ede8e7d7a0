//! Chat protocol data model: record shapes, their static schemas and the codec.

#[macro_use]
mod macros;

pub mod codec;
pub mod types;

pub use codec::{CodecError, decode, decode_value, encode, encode_value};
pub use types::{
    ChatCompletion, ChatError, ChatMessage, ChatRequest, ChatRole, CompletionDelta,
    CompletionOptions, Context, ErrorResponse, FileAttachment, MessageDelta,
};
