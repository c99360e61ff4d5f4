//! Capability bridge: answers `sampling/createMessage`

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::cascade::{resolve_model, ModelSettings, SelectionLog};
use super::{CreateMessageOutcome, SamplingHandler, SamplingRequest, SamplingRole, STOP_REASON_END_TURN};
use crate::diagnostics::DiagnosticSink;
use crate::error::{BridgeError, BridgeResult};
use crate::provider::{ChatMessage, ChatOptions, ModelProvider};

/// Stateless handler that picks a model and collects one full completion
#[derive(Clone)]
pub struct CapabilityBridge {
    provider: Arc<dyn ModelProvider>,
    settings: ModelSettings,
    sink: Arc<dyn DiagnosticSink>,
}

impl CapabilityBridge {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        settings: ModelSettings,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            provider,
            settings,
            sink,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    fn report(&self, log: &SelectionLog) {
        for line in log.lines() {
            self.sink.line(&format!("Model selection: {}", line));
        }
    }

    /// Only user/assistant messages with text survive translation
    fn chat_messages(request: &SamplingRequest) -> Vec<ChatMessage> {
        request
            .messages
            .iter()
            .filter_map(|msg| {
                let text = msg.as_text()?;
                match msg.role {
                    SamplingRole::User => Some(ChatMessage::user(text)),
                    SamplingRole::Assistant => Some(ChatMessage::assistant(text)),
                    SamplingRole::Other => None,
                }
            })
            .collect()
    }
}

#[async_trait]
impl SamplingHandler for CapabilityBridge {
    async fn create_message(&self, request: SamplingRequest) -> BridgeResult<CreateMessageOutcome> {
        self.sink.line(&format!(
            "Sampling request: {} message(s), max_tokens={}",
            request.messages.len(),
            request
                .max_tokens
                .map_or_else(|| "default".to_string(), |n| n.to_string())
        ));

        let (model, log) = match resolve_model(self.provider.as_ref(), &self.settings, &request.metadata).await {
            Ok(found) => found,
            Err(err) => {
                if let BridgeError::NoModelAvailable { attempts } = &err {
                    self.report(attempts);
                }
                self.sink.line(&format!("Sampling failed: {}", err));
                return Err(err);
            }
        };
        self.report(&log);

        let messages = Self::chat_messages(&request);
        let options = ChatOptions {
            max_tokens: request.max_tokens,
            system_prompt: request.system_prompt.clone(),
            temperature: request.temperature,
        };

        let mut stream = self
            .provider
            .stream_chat(&model, messages, options)
            .await
            .inspect_err(|e| self.sink.line(&format!("Sampling failed: {}", e)))?;

        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(fragment) => text.push_str(&fragment),
                Err(e) => {
                    self.sink.line(&format!("Sampling failed: {}", e));
                    return Err(e);
                }
            }
        }

        tracing::debug!(model = %model.id, chars = text.len(), "Sampling completed");
        Ok(CreateMessageOutcome {
            text,
            model_id: model.id,
            stop_reason: STOP_REASON_END_TURN.to_string(),
        })
    }
}
