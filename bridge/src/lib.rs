//! Supervised MCP client with a sampling bridge
//!
//! - [`supervisor`]: one lazily started, single-flight MCP session with a
//!   reconnect-and-retry-once policy for closed transports
//! - [`sampling`]: answers the server's `createMessage` requests by picking a
//!   model through a fallback cascade and collecting a full completion
//! - [`facade`]: typed calls for the server's `greet`, `generate_story` and
//!   `query_html` tools

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod facade;
pub mod launch;
pub mod provider;
pub mod sampling;
pub mod session;
pub mod supervisor;

pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use error::{BridgeError, BridgeResult};
pub use facade::{ToolFacade, ToolSpec};
pub use launch::LaunchTarget;
pub use sampling::CapabilityBridge;
pub use supervisor::{ConnectionState, Supervisor};
