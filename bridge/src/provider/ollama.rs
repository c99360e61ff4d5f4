//! Ollama model provider
//!
//! Models come from `/api/tags` (family taken from `details`), generation
//! streams newline-delimited JSON from `/api/chat`.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use url::Url;

use super::{ChatMessage, ChatOptions, ChatRole, ModelInfo, ModelProvider, ModelSelector, TextStream};
use crate::error::{BridgeError, BridgeResult};

/// Vendor name reported for every Ollama model
pub const OLLAMA_VENDOR: &str = "ollama";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    details: TagDetails,
}

#[derive(Debug, Default, Deserialize)]
struct TagDetails {
    #[serde(default)]
    family: String,
    #[serde(default)]
    families: Option<Vec<String>>,
}

/// One line of a streaming `/api/chat` response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    pub done_reason: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkMessage {
    pub content: Option<String>,
}

impl From<TagModel> for ModelInfo {
    fn from(tag: TagModel) -> Self {
        ModelInfo {
            id: tag.name,
            vendor: OLLAMA_VENDOR.to_string(),
            family: tag.details.family,
            families: tag.details.families.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Ollama HTTP client
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: Url,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for the given server URL (e.g. `http://localhost:11434`).
    /// A path prefix is kept, so a proxied `https://host/ollama` works too.
    pub fn new(url: &str) -> BridgeResult<Self> {
        let mut base_url = Url::parse(url)
            .map_err(|e| BridgeError::Config(format!("invalid Ollama URL '{}': {}", url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BridgeError::Config(format!("invalid Ollama URL '{}'", url)));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> BridgeResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BridgeError::Config(format!("invalid Ollama endpoint '{}': {}", path, e)))
    }

    /// Every locally available model
    pub async fn list_models(&self) -> BridgeResult<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.endpoint("api/tags")?)
            .send()
            .await
            .map_err(provider_error)?;

        if !response.status().is_success() {
            return Err(BridgeError::Provider(format!(
                "Ollama /api/tags returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response.json().await.map_err(provider_error)?;
        Ok(tags.models.into_iter().map(ModelInfo::from).collect())
    }

    fn chat_body(model: &ModelInfo, messages: &[ChatMessage], options: &ChatOptions) -> serde_json::Value {
        let mut wire: Vec<serde_json::Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &options.system_prompt {
            wire.push(serde_json::json!({ "role": "system", "content": system }));
        }
        wire.extend(messages.iter().map(|m| {
            let role = match m.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            serde_json::json!({ "role": role, "content": m.text })
        }));

        let mut body = serde_json::json!({
            "model": model.id,
            "messages": wire,
            "stream": true,
        });

        let mut generation = serde_json::Map::new();
        if let Some(max_tokens) = options.max_tokens {
            generation.insert("num_predict".into(), max_tokens.into());
        }
        if let Some(temperature) = options.temperature {
            generation.insert("temperature".into(), temperature.into());
        }
        if !generation.is_empty() {
            body["options"] = serde_json::Value::Object(generation);
        }
        body
    }

    /// Parse a streaming response line
    pub fn parse_chunk(line: &str) -> BridgeResult<Option<ChatChunk>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| BridgeError::Provider(format!("malformed Ollama chunk: {}", e)))
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn select_models(&self, selector: &ModelSelector) -> BridgeResult<Vec<ModelInfo>> {
        let models = self.list_models().await?;
        Ok(models.into_iter().filter(|m| selector.matches(m)).collect())
    }

    async fn stream_chat(
        &self,
        model: &ModelInfo,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> BridgeResult<TextStream> {
        let body = Self::chat_body(model, &messages, &options);

        let response = self
            .client
            .post(self.endpoint("api/chat")?)
            .json(&body)
            .send()
            .await
            .map_err(provider_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Provider(format!(
                "Ollama chat request failed: {} - {}",
                status, text
            )));
        }

        let lines = ChatLines::new(Box::pin(response.bytes_stream()));
        let stream = futures_util::stream::unfold(lines, |mut lines| async move {
            lines.next_fragment().await.map(|item| (item, lines))
        });
        Ok(stream.boxed())
    }
}

fn provider_error(err: reqwest::Error) -> BridgeError {
    BridgeError::Provider(err.to_string())
}

// ============================================================================
// NDJSON decoding
// ============================================================================

type ByteStream<B> = Pin<Box<dyn Stream<Item = reqwest::Result<B>> + Send>>;

/// Splits the body into lines and yields the text of each chunk.
/// Bytes are buffered raw and only complete lines are decoded, so a
/// multi-byte character split across network chunks survives.
struct ChatLines<B> {
    bytes: ByteStream<B>,
    buffer: Vec<u8>,
    pending: VecDeque<BridgeResult<String>>,
    done: bool,
    finished: bool,
}

impl<B: AsRef<[u8]>> ChatLines<B> {
    fn new(bytes: ByteStream<B>) -> Self {
        Self {
            bytes,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
            finished: false,
        }
    }

    async fn next_fragment(&mut self) -> Option<BridgeResult<String>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(chunk.as_ref());
                    self.drain_lines();
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.pending.push_back(Err(provider_error(e)));
                }
                None => {
                    let rest = std::mem::take(&mut self.buffer);
                    self.push_bytes(&rest);
                    if !self.finished && !self.done {
                        self.pending.push_back(Err(BridgeError::Provider(
                            "Ollama stream ended before done".to_string(),
                        )));
                    }
                    self.finished = true;
                }
            }
        }
    }

    fn drain_lines(&mut self) {
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.push_bytes(&line);
        }
    }

    fn push_bytes(&mut self, line: &[u8]) {
        if self.finished {
            return;
        }
        match std::str::from_utf8(line) {
            Ok(line) => self.push_line(line),
            Err(e) => {
                self.finished = true;
                self.pending
                    .push_back(Err(BridgeError::Provider(format!("Ollama chunk is not UTF-8: {}", e))));
            }
        }
    }

    fn push_line(&mut self, line: &str) {
        match OllamaProvider::parse_chunk(line) {
            Ok(Some(chunk)) => {
                if let Some(error) = chunk.error {
                    self.finished = true;
                    self.pending.push_back(Err(BridgeError::Provider(error)));
                    return;
                }
                if let Some(content) = chunk.message.and_then(|m| m.content) {
                    if !content.is_empty() {
                        self.pending.push_back(Ok(content));
                    }
                }
                if chunk.done {
                    self.done = true;
                    tracing::debug!(reason = ?chunk.done_reason, "Ollama stream finished");
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.finished = true;
                self.pending.push_back(Err(e));
            }
        }
    }
}
