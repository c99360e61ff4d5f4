//! Tool result builders and sampling response decoding

use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use serde::Serialize;
use serde_json::Value;

/// Successful plain text response
pub fn text_success(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Successful response carrying pretty-printed JSON as text
pub fn json_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Text of a serialized `CreateMessageResult`.
///
/// The content may be a single part or a list of parts; text parts are
/// concatenated and anything else is ignored.
pub fn sampled_text(result: &Value) -> Option<String> {
    fn text_of(part: &Value) -> Option<&str> {
        (part.get("type")?.as_str()? == "text")
            .then(|| part.get("text").and_then(Value::as_str))
            .flatten()
    }

    match result.get("content")? {
        Value::Array(parts) => {
            let texts: Vec<&str> = parts.iter().filter_map(text_of).collect();
            (!texts.is_empty()).then(|| texts.concat())
        }
        part => text_of(part).map(str::to_string),
    }
}
