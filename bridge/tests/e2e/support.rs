//! Shared fixtures: in-process demo server and scripted models

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use demo_mcp::DemoMcpServer;
use futures_util::StreamExt;
use mcp_bridge::error::BridgeResult;
use mcp_bridge::provider::{ChatMessage, ChatOptions, ModelInfo, ModelProvider, ModelSelector, TextStream};
use mcp_bridge::sampling::SamplingHandler;
use mcp_bridge::session::{ProtocolSession, RmcpSession, SamplingClient, SessionConnector};
use mcp_bridge::LaunchTarget;
use rmcp::ServiceExt;

/// Start the demo server on one end of a duplex pipe and a client session on the other
pub async fn in_process_session(handler: Arc<dyn SamplingHandler>) -> BridgeResult<RmcpSession> {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);

    tokio::spawn(async move {
        match DemoMcpServer::new().serve(server_io).await {
            Ok(service) => {
                let _ = service.waiting().await;
            }
            Err(e) => eprintln!("demo server failed to start: {}", e),
        }
    });

    RmcpSession::start(SamplingClient::new(handler), client_io, Duration::from_secs(10)).await
}

/// Connector that serves every session from an in-process demo server
#[derive(Default)]
pub struct InProcessConnector {
    pub spawns: AtomicUsize,
}

impl InProcessConnector {
    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for InProcessConnector {
    async fn connect(
        &self,
        _target: &LaunchTarget,
        handler: Arc<dyn SamplingHandler>,
    ) -> BridgeResult<Arc<dyn ProtocolSession>> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let session = in_process_session(handler).await?;
        Ok(Arc::new(session))
    }
}

/// Provider with fixed models that streams a canned reply word by word
pub struct ScriptedModels {
    pub models: Vec<ModelInfo>,
    pub reply: String,
}

impl ScriptedModels {
    pub fn new(reply: &str) -> Self {
        Self {
            models: vec![ModelInfo::new("llama3.1:8b", "ollama", "llama")],
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedModels {
    async fn select_models(&self, selector: &ModelSelector) -> BridgeResult<Vec<ModelInfo>> {
        Ok(self
            .models
            .iter()
            .filter(|m| selector.matches(m))
            .cloned()
            .collect())
    }

    async fn stream_chat(
        &self,
        _model: &ModelInfo,
        _messages: Vec<ChatMessage>,
        _options: ChatOptions,
    ) -> BridgeResult<TextStream> {
        let words: Vec<BridgeResult<String>> = self
            .reply
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(futures_util::stream::iter(words).boxed())
    }
}

/// An existing file to point launch targets at
pub fn placeholder_server(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("demo-mcp");
    std::fs::write(&path, "").expect("write placeholder");
    path
}
