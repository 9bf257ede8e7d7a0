use axum::body::Bytes;
use serde_json::{Map, Value};

use super::codec::{Record, TypeDesc};

/// Free-form key/value context attached to messages and completions.
pub type Context = Map<String, Value>;

const CONTEXT: TypeDesc = TypeDesc::Map(&TypeDesc::String, &TypeDesc::Any);
const OPTIONAL_CONTEXT: TypeDesc = TypeDesc::Optional(&CONTEXT);
const OPTIONAL_ANY: TypeDesc = TypeDesc::Optional(&TypeDesc::Any);
const ROLE: TypeDesc = TypeDesc::Enum(&ChatRole::ENUM);

tagged! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ChatRole {
        User = "user",
        Assistant = "assistant",
        System = "system",
    }
}

record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct FileAttachment {
        pub content_type: String => TypeDesc::String, wire = "contentType";
        pub data: Bytes => TypeDesc::Bytes;
    }
}

record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct ChatMessage {
        pub role: ChatRole => ROLE;
        pub content: String => TypeDesc::String;
        pub context: Option<Context> => OPTIONAL_CONTEXT;
        /// Filled contiguously from index 0 when rebuilt from multipart parts.
        pub files: Option<Vec<FileAttachment>> =>
            TypeDesc::Optional(&TypeDesc::List(&TypeDesc::Record(FileAttachment::SHAPE)));
    }
}

record! {
    /// Partial message carried by a streamed increment.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct MessageDelta {
        pub role: Option<ChatRole> => TypeDesc::Optional(&ROLE);
        pub content: Option<String> => TypeDesc::Optional(&TypeDesc::String);
        pub context: Option<Context> => OPTIONAL_CONTEXT;
    }
}

record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct ChatCompletion {
        pub message: ChatMessage => TypeDesc::Record(ChatMessage::SHAPE);
        /// `Some(Value::Null)` is not a distinct state: it encodes as an absent
        /// key and decodes back as `None`.
        pub session_state: Option<Value> => OPTIONAL_ANY, wire = "sessionState";
        pub context: Option<Context> => OPTIONAL_CONTEXT;
    }
}

record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct CompletionDelta {
        pub delta: MessageDelta => TypeDesc::Record(MessageDelta::SHAPE);
        /// JSON `null` decodes as `None`.
        pub session_state: Option<Value> => OPTIONAL_ANY, wire = "sessionState";
        pub context: Option<Context> => OPTIONAL_CONTEXT;
    }
}

record! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ChatError {
        pub code: String => TypeDesc::String;
        pub message: String => TypeDesc::String;
    }
}

record! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ErrorResponse {
        pub error: ChatError => TypeDesc::Record(ChatError::SHAPE);
    }
}

record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct ChatRequest {
        pub messages: Vec<ChatMessage> =>
            TypeDesc::List(&TypeDesc::Record(ChatMessage::SHAPE));
        /// JSON `null` decodes as `None`.
        pub session_state: Option<Value> => OPTIONAL_ANY, wire = "sessionState";
        pub context: Option<Bytes> => TypeDesc::Optional(&TypeDesc::Bytes);
    }
}

record! {
    /// Per-call options that travel alongside a request.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct CompletionOptions {
        pub context: Option<Context> => OPTIONAL_CONTEXT;
        pub session_state: Option<Value> => OPTIONAL_ANY, wire = "sessionState";
    }
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            context: None,
            files: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ChatError {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::codec::{CodecError, decode, decode_value, encode, encode_value};
    use serde_json::json;

    fn png() -> FileAttachment {
        FileAttachment {
            content_type: "image/png".into(),
            data: Bytes::from_static(&[0x89, b'P', b'N', b'G']),
        }
    }

    fn rich_message() -> ChatMessage {
        let mut context = Context::new();
        context.insert("key".into(), json!("value"));
        context.insert("nested".into(), json!({"n": [1, 2, 3]}));
        ChatMessage {
            role: ChatRole::User,
            content: "Hello".into(),
            context: Some(context),
            files: Some(vec![png()]),
        }
    }

    fn round_trip<R: Record + PartialEq + std::fmt::Debug>(value: &R) {
        let map = encode(value).unwrap();
        let back: R = decode(&map).unwrap();
        assert_eq!(&back, value);
    }

    #[test]
    fn every_shape_round_trips() {
        round_trip(&png());
        round_trip(&rich_message());
        round_trip(&ChatMessage::assistant("plain"));
        round_trip(&MessageDelta::default());
        round_trip(&MessageDelta {
            role: Some(ChatRole::Assistant),
            content: Some("He".into()),
            context: None,
        });
        round_trip(&ChatCompletion {
            message: rich_message(),
            session_state: Some(json!("7f0c")),
            context: Some(Context::new()),
        });
        round_trip(&CompletionDelta {
            delta: MessageDelta {
                role: None,
                content: Some("llo".into()),
                context: None,
            },
            session_state: Some(json!({"turn": 2})),
            context: None,
        });
        round_trip(&ErrorResponse::new("bad_request", "nope"));
        round_trip(&CompletionOptions::default());
        round_trip(&CompletionOptions {
            context: Some(Context::from_iter([("lang".to_string(), json!("en"))])),
            session_state: Some(json!("s-2")),
        });
        round_trip(&ChatRequest {
            messages: vec![ChatMessage::system("be brief"), rich_message()],
            session_state: Some(json!(42)),
            context: Some(Bytes::from_static(b"\x00\x01opaque")),
        });
    }

    #[test]
    fn content_type_is_renamed_on_the_wire() {
        let map = encode(&png()).unwrap();
        assert!(map.contains_key("contentType"));
        assert!(!map.contains_key("content_type"));
        assert_eq!(map["data"], json!("iVBORw=="));
    }

    #[test]
    fn session_state_is_renamed_and_keeps_declaration_order() {
        let value = encode_value(&ChatCompletion {
            message: ChatMessage::assistant("hi"),
            session_state: Some(json!("abc")),
            context: None,
        })
        .unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["message", "sessionState"]);
        assert_eq!(value["message"], json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn missing_role_is_a_schema_error() {
        let err = decode_value::<ChatMessage>(&json!({"content": "hi"})).unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingField {
                path: "ChatMessage".into(),
                field: "role"
            }
        );
    }

    #[test]
    fn unknown_role_is_an_invalid_enum_value() {
        let err = decode_value::<ChatMessage>(&json!({"role": "robot", "content": "hi"}))
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidEnumValue {
                path: "ChatMessage.role".into(),
                enum_name: "ChatRole",
                value: "robot".into()
            }
        );
    }

    #[test]
    fn nested_errors_carry_the_full_path() {
        let err = decode_value::<ChatRequest>(&json!({
            "messages": [
                {"role": "user", "content": "ok"},
                {"role": "user", "content": "x", "files": [{"data": "AA=="}]}
            ]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingField {
                path: "ChatRequest.messages[1].files[0]".into(),
                field: "contentType"
            }
        );
    }

    #[test]
    fn null_and_missing_optionals_decode_as_absent() {
        let request: ChatRequest = decode_value(&json!({
            "messages": [{"role": "user", "content": "hi", "context": null}],
            "sessionState": null
        }))
        .unwrap();
        assert_eq!(request.session_state, None);
        assert_eq!(request.context, None);
        assert_eq!(request.messages[0], ChatMessage::user("hi"));
    }

    #[test]
    fn explicit_empty_files_survive_decoding() {
        let message: ChatMessage =
            decode_value(&json!({"role": "user", "content": "hi", "files": []})).unwrap();
        assert_eq!(message.files, Some(vec![]));
    }

    #[test]
    fn role_tags_are_lowercase() {
        assert_eq!(ChatRole::System.as_str(), "system");
        assert_eq!(ChatRole::from_tag("assistant"), Some(ChatRole::Assistant));
        assert_eq!(ChatRole::from_tag("Assistant"), None);
    }

    #[test]
    fn null_session_state_is_not_a_distinct_state() {
        let completion = ChatCompletion {
            message: ChatMessage::assistant("hi"),
            session_state: Some(Value::Null),
            context: None,
        };
        let map = encode(&completion).unwrap();
        assert!(!map.contains_key("sessionState"));

        let back: ChatCompletion = decode(&map).unwrap();
        assert_eq!(back.session_state, None);
    }

    #[test]
    fn completion_options_use_the_session_state_wire_name() {
        let options: CompletionOptions = decode_value(&json!({"sessionState": 7})).unwrap();
        assert_eq!(options.session_state, Some(json!(7)));
        assert_eq!(options.context, None);
        assert_eq!(encode_value(&options).unwrap(), json!({"sessionState": 7}));
    }
}
