//! Gmail REST v1 wire types.
//!
//! Every field deserializes with a default so that partial payloads
//! (no `body`, no `parts`, no `headers`) never fail to parse.

use serde::{Deserialize, Serialize};

/// Opaque message identifier returned by a list query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: String::new(),
        }
    }
}

/// One page of a list-messages response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// Full message envelope from get-message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// A node of the MIME tree. The root payload is itself a part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Inline body of a part. `data` is base64url text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Gmail label, only used by the access probe.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelList {
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl MessagePart {
    /// Body data, if present and non-empty.
    pub fn body_data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// MIME essence, lowercased, parameters stripped.
    pub fn mime_essence(&self) -> String {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

impl Message {
    pub fn subject(&self) -> String {
        self.payload
            .as_ref()
            .and_then(|p| p.header("Subject"))
            .unwrap_or_default()
            .to_string()
    }

    pub fn date(&self) -> String {
        self.payload
            .as_ref()
            .and_then(|p| p.header("Date"))
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_page_deserialization() {
        let json = r#"{
            "messages": [
                {"id": "msg1", "threadId": "thread1"},
                {"id": "msg2", "threadId": "thread2"}
            ],
            "nextPageToken": "token123",
            "resultSizeEstimate": 2
        }"#;

        let page: MessagePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].id, "msg1");
        assert_eq!(page.messages[1].thread_id, "thread2");
        assert_eq!(page.next_page_token.as_deref(), Some("token123"));
    }

    #[test]
    fn empty_page_has_no_messages() {
        let page: MessagePage = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(page.messages.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn message_without_body_or_parts_parses() {
        let json = r#"{
            "id": "abc",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    {"name": "Subject", "value": "Team sync"},
                    {"name": "Date", "value": "Tue, 8 Jul 2025 09:30:00 +0530"}
                ]
            }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        let payload = msg.payload.as_ref().unwrap();
        assert!(payload.body.is_none());
        assert!(payload.parts.is_empty());
        assert_eq!(msg.subject(), "Team sync");
        assert_eq!(msg.date(), "Tue, 8 Jul 2025 09:30:00 +0530");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let part = MessagePart {
            headers: vec![Header {
                name: "subject".into(),
                value: "lower".into(),
            }],
            ..Default::default()
        };
        assert_eq!(part.header("Subject"), Some("lower"));
        assert_eq!(part.header("Date"), None);
    }

    #[test]
    fn mime_essence_strips_parameters() {
        let part = MessagePart {
            mime_type: "Text/Plain; charset=\"UTF-8\"".into(),
            ..Default::default()
        };
        assert_eq!(part.mime_essence(), "text/plain");
    }

    #[test]
    fn empty_body_data_is_absent() {
        let part = MessagePart {
            body: Some(PartBody {
                size: 0,
                data: Some(String::new()),
                attachment_id: None,
            }),
            ..Default::default()
        };
        assert!(part.body_data().is_none());
    }
}
