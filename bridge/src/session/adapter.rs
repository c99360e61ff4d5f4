//! `rmcp` implementation of the session traits

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParam, ClientCapabilities, ClientInfo, CreateMessageRequestParam,
        CreateMessageResult, ErrorData as McpError, Implementation,
    },
    service::{RequestContext, RunningService, ServiceError},
    transport::{IntoTransport, TokioChildProcess},
    ClientHandler, Peer, RoleClient, ServiceExt,
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{
    ProtocolSession, SessionConnector, ToolDescriptor, ToolOutput, DEFAULT_STARTUP_TIMEOUT,
    DEFAULT_TOOL_TIMEOUT,
};
use crate::error::{BridgeError, BridgeResult};
use crate::launch::LaunchTarget;
use crate::sampling::{SamplingHandler, SamplingRequest};

// ============================================================================
// Client handler
// ============================================================================

/// Client-side handler advertising the sampling capability
#[derive(Clone)]
pub struct SamplingClient {
    handler: Arc<dyn SamplingHandler>,
}

impl SamplingClient {
    pub fn new(handler: Arc<dyn SamplingHandler>) -> Self {
        Self { handler }
    }
}

impl ClientHandler for SamplingClient {
    async fn create_message(
        &self,
        params: CreateMessageRequestParam,
        _context: RequestContext<RoleClient>,
    ) -> Result<CreateMessageResult, McpError> {
        let raw = serde_json::to_value(&params)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        let request: SamplingRequest = serde_json::from_value(raw)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let outcome = self
            .handler
            .create_message(request)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        serde_json::from_value(outcome.to_wire())
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    fn get_info(&self) -> ClientInfo {
        ClientInfo {
            capabilities: ClientCapabilities::builder().enable_sampling().build(),
            client_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A live rmcp client session
pub struct RmcpSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, SamplingClient>>>,
    tool_timeout: Duration,
}

impl RmcpSession {
    /// Run the initialize handshake over an already-open transport
    pub async fn start<T, E, A>(
        client: SamplingClient,
        transport: T,
        tool_timeout: Duration,
    ) -> BridgeResult<Self>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let service = client
            .serve(transport)
            .await
            .map_err(|e| BridgeError::Handshake(format!("MCP initialize failed: {}", e)))?;

        tracing::debug!("MCP handshake complete");

        Ok(Self {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            tool_timeout,
        })
    }
}

fn service_error(err: ServiceError) -> BridgeError {
    match err {
        ServiceError::TransportClosed => BridgeError::TransportClosed {
            message: "Connection closed".to_string(),
        },
        ServiceError::McpError(data) => {
            BridgeError::invocation(data.message.to_string(), Some(data.code.0))
        }
        other => BridgeError::invocation(other.to_string(), None),
    }
}

#[async_trait]
impl ProtocolSession for RmcpSession {
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        let tools = self.peer.list_all_tools().await.map_err(service_error)?;

        Ok(tools
            .into_iter()
            .map(|t| ToolDescriptor {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> BridgeResult<ToolOutput> {
        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(arguments),
            task: None,
        };

        let result = tokio::time::timeout(self.tool_timeout, self.peer.call_tool(request))
            .await
            .map_err(|_| {
                BridgeError::invocation(
                    format!("Tool '{}' timed out after {:?}", name, self.tool_timeout),
                    None,
                )
            })?
            .map_err(service_error)?;

        let raw = serde_json::to_value(&result)
            .map_err(|e| BridgeError::invocation(format!("unreadable tool result: {}", e), None))?;
        serde_json::from_value(raw)
            .map_err(|e| BridgeError::invocation(format!("unreadable tool result: {}", e), None))
    }

    async fn close(&self) {
        let Some(service) = self.service.lock().await.take() else {
            return;
        };
        if let Err(e) = service.cancel().await {
            tracing::warn!("Error cancelling MCP session: {}", e);
        }
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Spawns the server as a child process and runs the handshake
#[derive(Debug, Clone, Copy)]
pub struct RmcpConnector {
    pub startup_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for RmcpConnector {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

#[async_trait]
impl SessionConnector for RmcpConnector {
    async fn connect(
        &self,
        target: &LaunchTarget,
        handler: Arc<dyn SamplingHandler>,
    ) -> BridgeResult<Arc<dyn ProtocolSession>> {
        let client = SamplingClient::new(handler);
        let path = target.server_path.display().to_string();

        // Spawn + initialization share the startup timeout. The command is
        // kill_on_drop, so bailing out here reaps the child.
        let session = tokio::time::timeout(self.startup_timeout, async {
            let transport = TokioChildProcess::new(target.command()).map_err(|e| {
                BridgeError::TransportSpawn {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            RmcpSession::start(client, transport, self.tool_timeout).await
        })
        .await
        .map_err(|_| {
            BridgeError::Handshake(format!(
                "MCP server '{}' startup timed out after {:?}",
                path, self.startup_timeout
            ))
        })??;

        Ok(Arc::new(session))
    }
}
