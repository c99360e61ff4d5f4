//! Bridge error taxonomy
//!
//! Every failure the supervisor, session adapter or capability bridge can
//! surface. The enum is `Clone` so a single connect outcome can be handed to
//! every caller that was waiting on the same attempt.

use thiserror::Error;

use crate::sampling::SelectionLog;

/// JSON-RPC code the server side uses for "connection closed".
pub const CONNECTION_CLOSED_CODE: i32 = -32000;

/// Result alias used throughout the crate
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors produced while talking to the MCP server or answering its requests
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The server executable/script is missing or could not be spawned
    #[error("failed to launch MCP server at {path}: {reason}")]
    TransportSpawn { path: String, reason: String },

    /// Initialization failed or the server lacks a required tool
    #[error("{0}")]
    Handshake(String),

    /// Generic failure of a tool call
    #[error("{message}")]
    ToolInvocation { message: String, code: Option<i32> },

    /// The transport went away underneath a call
    #[error("{message}")]
    TransportClosed { message: String },

    /// The model cascade ran out of selectors
    #[error("no language model available; tried:\n{attempts}")]
    NoModelAvailable { attempts: SelectionLog },

    /// The model provider failed while listing or generating
    #[error("model provider error: {0}")]
    Provider(String),

    /// A tool was invoked without one of its required fields
    #[error("tool '{tool}' requires argument '{field}'")]
    MissingArgument { tool: String, field: String },

    /// Settings could not be resolved
    #[error("config error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Build a tool invocation error from a message and optional RPC code
    pub fn invocation(message: impl Into<String>, code: Option<i32>) -> Self {
        Self::ToolInvocation {
            message: message.into(),
            code,
        }
    }

    /// Whether this failure qualifies for one reconnect-and-retry.
    ///
    /// Matches the substring "closed" (any case) in the message, or the
    /// connection-closed RPC code. The heuristic is intentionally literal.
    pub fn is_transport_closed(&self) -> bool {
        match self {
            Self::TransportClosed { .. } => true,
            Self::ToolInvocation { message, code } => {
                *code == Some(CONNECTION_CLOSED_CODE) || message.to_lowercase().contains("closed")
            }
            _ => false,
        }
    }

    /// Extra guidance shown to humans when the server cannot be started
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::TransportSpawn { .. } | Self::Handshake(_) | Self::Config(_) => Some(
                "Ensure the server's runtime is installed and the server path is correct.",
            ),
            _ => None,
        }
    }
}
