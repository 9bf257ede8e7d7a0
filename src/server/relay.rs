use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64_STANDARD;
use serde_json::Value;

use crate::model::{
    ChatCompletion, ChatMessage, ChatRole, CompletionDelta, FileAttachment, MessageDelta,
};
use crate::providers::openai::{ContentPart, ImageUrl, UpstreamContent, UpstreamMessage};
use crate::providers::{UpstreamDelta, UpstreamReply};

pub fn image_data_uri(file: &FileAttachment) -> String {
    format!(
        "data:{};base64,{}",
        file.content_type,
        B64_STANDARD.encode(&file.data)
    )
}

fn is_image(file: &FileAttachment) -> bool {
    file.content_type
        .get(..6)
        .is_some_and(|p| p.eq_ignore_ascii_case("image/"))
}

/// Maps one chat message to the upstream shape. Messages with files become
/// a text segment followed by one `image_url` segment per image file.
pub fn to_upstream_message(message: &ChatMessage) -> UpstreamMessage {
    let role = message.role.as_str().to_string();
    let Some(files) = &message.files else {
        return UpstreamMessage {
            role,
            content: UpstreamContent::Text(message.content.clone()),
        };
    };

    let mut parts = vec![ContentPart::Text {
        text: message.content.clone(),
    }];
    for file in files {
        if is_image(file) {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image_data_uri(file),
                },
            });
        } else {
            tracing::warn!(
                content_type = %file.content_type,
                bytes = file.data.len(),
                "Dropping non-image attachment from upstream message"
            );
        }
    }

    UpstreamMessage {
        role,
        content: UpstreamContent::Parts(parts),
    }
}

pub fn to_upstream_messages(messages: &[ChatMessage]) -> Vec<UpstreamMessage> {
    messages.iter().map(to_upstream_message).collect()
}

pub fn completion_from_reply(reply: UpstreamReply, session_state: Option<Value>) -> ChatCompletion {
    ChatCompletion {
        message: ChatMessage::new(reply.role.unwrap_or(ChatRole::Assistant), reply.content),
        session_state,
        context: None,
    }
}

pub fn delta_from_upstream(delta: UpstreamDelta, session_state: Option<Value>) -> CompletionDelta {
    CompletionDelta {
        delta: MessageDelta {
            role: delta.role,
            content: delta.content,
            context: None,
        },
        session_state,
        context: None,
    }
}
