//! Protocol session abstraction
//!
//! The supervisor only sees these traits. `rmcp` lives behind
//! [`RmcpConnector`]; tests substitute in-memory fakes.

mod adapter;
mod content;

pub use adapter::{RmcpConnector, RmcpSession, SamplingClient};
pub use content::{ContentPart, ToolOutput};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::BridgeResult;
use crate::launch::LaunchTarget;
use crate::sampling::SamplingHandler;

/// Default startup timeout for spawning and initializing the server
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default tool call timeout
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// A tool advertised by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A negotiated RPC channel to the server
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// List every tool the server exposes
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>>;

    /// Call a tool by name
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> BridgeResult<ToolOutput>;

    /// Shut the session down and release the subprocess. Safe to call twice.
    async fn close(&self);
}

/// Opens sessions. The sampling handler is installed before the handshake
/// starts, so the server never sees the capability without a handler.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        target: &LaunchTarget,
        handler: Arc<dyn SamplingHandler>,
    ) -> BridgeResult<Arc<dyn ProtocolSession>>;
}
