//! Server-initiated sampling
//!
//! The MCP server may ask the client to generate text (`sampling/createMessage`).
//! [`CapabilityBridge`] answers those requests by choosing a model through the
//! selection cascade and streaming the completion from a [`ModelProvider`].
//!
//! [`ModelProvider`]: crate::provider::ModelProvider

mod bridge;
mod cascade;

pub use bridge::CapabilityBridge;
pub use cascade::{
    resolve_model, ModelSettings, SelectionAttempt, SelectionLog, DEFAULT_FAMILIES,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeResult;

/// Stop reason reported when the provider stream ends normally
pub const STOP_REASON_END_TURN: &str = "endTurn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingRole {
    User,
    Assistant,
    /// Any role this client does not forward
    #[serde(other)]
    Other,
}

/// One message of a sampling request, content kept as sent
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SamplingMessage {
    pub role: SamplingRole,
    pub content: Value,
}

impl SamplingMessage {
    pub fn text(role: SamplingRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: serde_json::json!({ "type": "text", "text": text.into() }),
        }
    }

    /// Literal text of the message, `None` for non-text content
    pub fn as_text(&self) -> Option<String> {
        fn text_of(part: &Value) -> Option<&str> {
            match part.get("type").and_then(Value::as_str) {
                Some("text") => part.get("text").and_then(Value::as_str),
                _ => None,
            }
        }

        match &self.content {
            Value::Array(parts) => {
                let texts: Vec<&str> = parts.iter().filter_map(text_of).collect();
                (!texts.is_empty()).then(|| texts.concat())
            }
            other => text_of(other).map(str::to_string),
        }
    }
}

/// Selection hints carried in the request's `metadata`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingMetadata {
    #[serde(default)]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub preferred_families: Vec<String>,
}

/// Decoded `sampling/createMessage` parameters
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRequest {
    pub messages: Vec<SamplingMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: SamplingMetadata,
}

/// Metadata is free-form on the wire; anything unparseable counts as empty
fn lenient_metadata<'de, D>(deserializer: D) -> Result<SamplingMetadata, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default())
}

/// The assembled answer returned to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMessageOutcome {
    pub text: String,
    pub model_id: String,
    pub stop_reason: String,
}

impl CreateMessageOutcome {
    /// Wire form of an MCP `CreateMessageResult`
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "role": "assistant",
            "content": { "type": "text", "text": self.text },
            "model": self.model_id,
            "stopReason": self.stop_reason,
        })
    }
}

/// Handler for inbound sampling requests
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(&self, request: SamplingRequest) -> BridgeResult<CreateMessageOutcome>;
}
