//! Model provider abstraction
//!
//! The capability bridge never talks to an inference backend directly. It
//! asks a [`ModelProvider`] for models matching a selector and streams text
//! from the one it picks.

#[cfg(feature = "ollama")]
mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaProvider, OLLAMA_VENDOR};

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::{BridgeError, BridgeResult};

/// Streamed text fragments from one generation request
pub type TextStream = BoxStream<'static, BridgeResult<String>>;

/// Lookup criteria. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSelector {
    pub vendor: Option<String>,
    pub family: Option<String>,
    pub id: Option<String>,
}

impl ModelSelector {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_family(vendor: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            vendor: Some(vendor.into()),
            family: Some(family.into()),
            id: None,
        }
    }

    pub fn by_vendor(vendor: impl Into<String>) -> Self {
        Self {
            vendor: Some(vendor.into()),
            ..Default::default()
        }
    }

    /// Whether `model` satisfies every set field
    pub fn matches(&self, model: &ModelInfo) -> bool {
        let vendor_ok = self
            .vendor
            .as_deref()
            .map_or(true, |v| model.vendor.eq_ignore_ascii_case(v));
        let family_ok = self.family.as_deref().map_or(true, |f| model.in_family(f));
        let id_ok = self.id.as_deref().map_or(true, |id| model.id == id);
        vendor_ok && family_ok && id_ok
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = &self.id {
            parts.push(format!("id={}", id));
        }
        if let Some(vendor) = &self.vendor {
            parts.push(format!("vendor={}", vendor));
        }
        if let Some(family) = &self.family {
            parts.push(format!("family={}", family));
        }
        if parts.is_empty() {
            write!(f, "any")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// A model the provider can generate with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Exact identifier used for id lookups and reported back to the server
    pub id: String,
    pub vendor: String,
    /// Primary family (e.g. "llama", "qwen2")
    pub family: String,
    /// Additional families the model belongs to
    pub families: Vec<String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, vendor: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: vendor.into(),
            family: family.into(),
            families: Vec::new(),
        }
    }

    pub fn in_family(&self, family: &str) -> bool {
        self.family.eq_ignore_ascii_case(family)
            || self.families.iter().any(|f| f.eq_ignore_ascii_case(family))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Message in the provider's chat representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Generation options forwarded with a chat request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
}

/// Backend that can enumerate models and stream completions
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Models matching `selector`, possibly empty
    async fn select_models(&self, selector: &ModelSelector) -> BridgeResult<Vec<ModelInfo>>;

    /// Start a generation and return its text fragments
    async fn stream_chat(
        &self,
        model: &ModelInfo,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> BridgeResult<TextStream>;
}

/// Provider with no models, for hosts built without a backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProvider;

#[async_trait]
impl ModelProvider for NoProvider {
    async fn select_models(&self, _selector: &ModelSelector) -> BridgeResult<Vec<ModelInfo>> {
        Ok(Vec::new())
    }

    async fn stream_chat(
        &self,
        model: &ModelInfo,
        _messages: Vec<ChatMessage>,
        _options: ChatOptions,
    ) -> BridgeResult<TextStream> {
        Err(BridgeError::Provider(format!(
            "no model provider configured for '{}'",
            model.id
        )))
    }
}
