//! Tool result decoding
//!
//! A tool call returns a list of tagged content parts. The first `text` part
//! is the answer; when there is none the whole payload is serialized instead.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Raw `tools/call` result as received on the wire
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(default)]
    pub structured_content: Option<Value>,
    #[serde(default)]
    pub is_error: Option<bool>,
}

/// One decoded content part
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart<'a> {
    Text(&'a str),
    Image { mime_type: Option<&'a str> },
    Audio { mime_type: Option<&'a str> },
    Resource { uri: Option<&'a str> },
    ResourceLink { uri: Option<&'a str> },
    /// Unrecognized tag or malformed part, kept verbatim
    Unknown(&'a Value),
}

impl<'a> ContentPart<'a> {
    /// Decode a part by its `type` tag
    pub fn decode(raw: &'a Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::Unknown(raw);
        };

        match obj.get("type").and_then(Value::as_str) {
            Some("text") => match str_field(obj, "text") {
                Some(text) => Self::Text(text),
                None => Self::Unknown(raw),
            },
            Some("image") => Self::Image {
                mime_type: str_field(obj, "mimeType"),
            },
            Some("audio") => Self::Audio {
                mime_type: str_field(obj, "mimeType"),
            },
            Some("resource") => Self::Resource {
                uri: obj
                    .get("resource")
                    .and_then(|r| r.get("uri"))
                    .and_then(Value::as_str),
            },
            Some("resource_link") => Self::ResourceLink {
                uri: str_field(obj, "uri"),
            },
            _ => Self::Unknown(raw),
        }
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

impl ToolOutput {
    /// Text-only output, as a server would send for a plain string result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![serde_json::json!({ "type": "text", "text": text.into() })],
            ..Default::default()
        }
    }

    /// Decoded view over the content parts
    pub fn parts(&self) -> impl Iterator<Item = ContentPart<'_>> {
        self.content.iter().map(ContentPart::decode)
    }

    /// First literal text part, if any
    pub fn first_text(&self) -> Option<&str> {
        self.parts().find_map(|part| match part {
            ContentPart::Text(text) => Some(text),
            _ => None,
        })
    }

    /// Serialize `structuredContent` when present, else the raw content list
    pub fn fallback_text(&self) -> String {
        let payload = match &self.structured_content {
            Some(structured) => structured.clone(),
            None => Value::Array(self.content.clone()),
        };
        payload.to_string()
    }

    /// Decode to a single string: the first text part or the fallback serialization
    pub fn into_text(self) -> String {
        match self.first_text() {
            Some(text) => text.to_string(),
            None => {
                tracing::debug!("Tool result has no text part, serializing payload");
                self.fallback_text()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(value: Value) -> ToolOutput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_part_decodes_to_literal() {
        let out = output(json!({"content": [{"type": "text", "text": "Hello, World!"}]}));
        assert_eq!(out.into_text(), "Hello, World!");
    }

    #[test]
    fn test_first_text_part_wins() {
        let out = output(json!({"content": [
            {"type": "image", "data": "AAAA", "mimeType": "image/png"},
            {"type": "text", "text": "first"},
            {"type": "text", "text": "second"}
        ]}));
        assert_eq!(out.into_text(), "first");
    }

    #[test]
    fn test_no_text_serializes_content() {
        let out = output(json!({"content": [{"type": "image", "data": "AAAA", "mimeType": "image/png"}]}));
        let text = out.into_text();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!([{"type": "image", "data": "AAAA", "mimeType": "image/png"}]));
    }

    #[test]
    fn test_no_text_prefers_structured_content() {
        let out = output(json!({
            "content": [],
            "structuredContent": {"count": 2, "items": ["a", "b"]}
        }));
        let parsed: Value = serde_json::from_str(&out.into_text()).unwrap();
        assert_eq!(parsed, json!({"count": 2, "items": ["a", "b"]}));
    }

    #[test]
    fn test_decode_every_tag() {
        let parts = [
            json!({"type": "text", "text": "t"}),
            json!({"type": "image", "mimeType": "image/png"}),
            json!({"type": "audio", "mimeType": "audio/wav"}),
            json!({"type": "resource", "resource": {"uri": "file:///a"}}),
            json!({"type": "resource_link", "uri": "file:///b"}),
            json!({"type": "hologram"}),
            json!({"type": "text"}),
            json!("bare string"),
        ];
        let decoded: Vec<_> = parts.iter().map(ContentPart::decode).collect();

        assert_eq!(decoded[0], ContentPart::Text("t"));
        assert_eq!(decoded[1], ContentPart::Image { mime_type: Some("image/png") });
        assert_eq!(decoded[2], ContentPart::Audio { mime_type: Some("audio/wav") });
        assert_eq!(decoded[3], ContentPart::Resource { uri: Some("file:///a") });
        assert_eq!(decoded[4], ContentPart::ResourceLink { uri: Some("file:///b") });
        assert!(matches!(decoded[5], ContentPart::Unknown(_)));
        assert!(matches!(decoded[6], ContentPart::Unknown(_)));
        assert!(matches!(decoded[7], ContentPart::Unknown(_)));
    }

    #[test]
    fn test_missing_content_defaults_empty() {
        let out = output(json!({}));
        assert_eq!(out.into_text(), "[]");
    }
}
