use axum::body::Bytes;

use crate::error::{GatewayError, Result as AppResult};
use crate::model::{ChatRequest, FileAttachment, decode_value};

pub const JSON_PART: &str = "json";
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// One binary part of a multipart chat submission.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Parts collected from a multipart body, before any decoding.
#[derive(Debug, Default)]
pub struct MultipartSubmission {
    pub json: Option<Bytes>,
    pub files: Vec<FilePart>,
}

/// Parses `messages[<i>].files[<j>]`. Both indices must be plain ASCII digits.
pub fn parse_file_part_name(name: &str) -> AppResult<(usize, usize)> {
    let invalid = || GatewayError::InvalidFilePartName(name.to_string());

    let rest = name.strip_prefix("messages[").ok_or_else(invalid)?;
    let (message, rest) = rest.split_once(']').ok_or_else(invalid)?;
    let rest = rest.strip_prefix(".files[").ok_or_else(invalid)?;
    let file = rest.strip_suffix(']').ok_or_else(invalid)?;

    Ok((parse_index(message).ok_or_else(invalid)?, parse_index(file).ok_or_else(invalid)?))
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // 超出 usize 的下标交给范围检查报错
    Some(s.parse().unwrap_or(usize::MAX))
}

impl MultipartSubmission {
    /// Decodes the `json` part and splices the file parts into its messages.
    pub fn reconstruct(self) -> AppResult<ChatRequest> {
        let json = self.json.ok_or(GatewayError::MissingJsonPart)?;
        let value: serde_json::Value = serde_json::from_slice(&json)
            .map_err(|e| GatewayError::BadRequest(format!("invalid json part: {}", e)))?;
        let mut request: ChatRequest = decode_value(&value)?;

        let mut positioned = self
            .files
            .into_iter()
            .map(|part| Ok((parse_file_part_name(&part.name)?, part)))
            .collect::<AppResult<Vec<_>>>()?;
        positioned.sort_by_key(|(pos, _)| *pos);

        let len = request.messages.len();
        for ((message_index, file_index), part) in positioned {
            let Some(message) = request.messages.get_mut(message_index) else {
                return Err(GatewayError::InvalidMessageIndex {
                    part: part.name,
                    index: message_index,
                    len,
                });
            };
            let files = message.files.get_or_insert_with(Vec::new);
            if file_index != files.len() {
                return Err(GatewayError::InvalidFileIndex {
                    part: part.name,
                    expected: files.len(),
                });
            }
            files.push(FileAttachment {
                content_type: part.content_type,
                data: part.data,
            });
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatRole;

    fn submission(json: &str, files: &[(&str, &str)]) -> MultipartSubmission {
        MultipartSubmission {
            json: Some(Bytes::from(json.to_string())),
            files: files
                .iter()
                .map(|(name, ct)| FilePart {
                    name: name.to_string(),
                    content_type: ct.to_string(),
                    data: Bytes::from(format!("{}-bytes", name)),
                })
                .collect(),
        }
    }

    const TWO_MESSAGES: &str = r#"{"messages":[
        {"role":"user","content":"first"},
        {"role":"user","content":"second"}
    ]}"#;

    #[test]
    fn part_names_accept_only_ascii_indices() {
        assert_eq!(parse_file_part_name("messages[0].files[0]").unwrap(), (0, 0));
        assert_eq!(parse_file_part_name("messages[12].files[3]").unwrap(), (12, 3));
        for bad in [
            "messages[].files[0]",
            "messages[-1].files[0]",
            "messages[+1].files[0]",
            "messages[1].files[0]x",
            "messages[１].files[0]",
            "message[0].files[0]",
            "messages[0]files[0]",
            "json",
        ] {
            assert!(
                matches!(parse_file_part_name(bad), Err(GatewayError::InvalidFilePartName(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn parts_bind_by_index_not_arrival_order() {
        let request = submission(
            TWO_MESSAGES,
            &[
                ("messages[1].files[0]", "image/jpeg"),
                ("messages[0].files[1]", "text/plain"),
                ("messages[0].files[0]", "image/png"),
            ],
        )
        .reconstruct()
        .unwrap();

        let first = request.messages[0].files.as_ref().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].content_type, "image/png");
        assert_eq!(first[0].data, Bytes::from("messages[0].files[0]-bytes"));
        assert_eq!(first[1].content_type, "text/plain");

        let second = request.messages[1].files.as_ref().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].content_type, "image/jpeg");
    }

    #[test]
    fn gap_in_file_indices_is_rejected() {
        let err = submission(TWO_MESSAGES, &[("messages[0].files[1]", "image/png")])
            .reconstruct()
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidFileIndex { expected: 0, .. }));
    }

    #[test]
    fn duplicate_file_index_is_rejected() {
        let err = submission(
            TWO_MESSAGES,
            &[
                ("messages[0].files[0]", "image/png"),
                ("messages[0].files[0]", "image/png"),
            ],
        )
        .reconstruct()
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidFileIndex { expected: 1, .. }));
    }

    #[test]
    fn message_index_out_of_range_is_rejected() {
        let err = submission(
            r#"{"messages":[{"role":"user","content":"only"}]}"#,
            &[("messages[5].files[0]", "image/png")],
        )
        .reconstruct()
        .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::InvalidMessageIndex { index: 5, len: 1, .. }
        ));
    }

    #[test]
    fn overflowing_indices_fail_the_range_checks() {
        assert_eq!(
            parse_file_part_name("messages[99999999999999999999999].files[0]").unwrap(),
            (usize::MAX, 0)
        );

        let err = submission(
            TWO_MESSAGES,
            &[("messages[99999999999999999999999].files[0]", "image/png")],
        )
        .reconstruct()
        .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::InvalidMessageIndex { index: usize::MAX, len: 2, .. }
        ));

        let err = submission(
            TWO_MESSAGES,
            &[("messages[0].files[99999999999999999999999]", "image/png")],
        )
        .reconstruct()
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidFileIndex { expected: 0, .. }));
    }

    #[test]
    fn missing_or_malformed_json_part() {
        let err = MultipartSubmission::default().reconstruct().unwrap_err();
        assert!(matches!(err, GatewayError::MissingJsonPart));

        let err = submission("{not json", &[]).reconstruct().unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));

        let err = submission(r#"{"messages":[{"content":"x"}]}"#, &[])
            .reconstruct()
            .unwrap_err();
        assert!(matches!(err, GatewayError::Codec(_)));
    }

    #[test]
    fn zero_file_parts_leave_request_untouched() {
        let request = submission(TWO_MESSAGES, &[]).reconstruct().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].role, ChatRole::User);
        assert!(request.messages.iter().all(|m| m.files.is_none()));
    }

    #[test]
    fn parts_append_after_inline_files() {
        // 内联的 files 已占用 0 号位置
        let json = r#"{"messages":[{"role":"user","content":"x",
            "files":[{"contentType":"image/gif","data":"R0lG"}]}]}"#;
        let request = submission(json, &[("messages[0].files[1]", "image/png")])
            .reconstruct()
            .unwrap();
        let files = request.messages[0].files.as_ref().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].content_type, "image/gif");
        assert_eq!(files[1].content_type, "image/png");
    }
}
