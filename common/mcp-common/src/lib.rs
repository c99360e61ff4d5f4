//! MCP Common - Shared plumbing for the bridge and its servers
//!
//! - **Initialization**: [`init_tracing`] and the `serve_stdio!` macro
//! - **Results**: builders for `CallToolResult` and text extraction from
//!   sampling responses
//! - **Errors**: short constructors for `ErrorData`
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{serve_stdio, text_success};
//!
//! serve_stdio!(MyServer, "my_mcp");
//!
//! fn greet(&self) -> Result<CallToolResult, McpError> {
//!     Ok(text_success("hello"))
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;

pub use error::{internal_error, invalid_params, McpResult, ResultExt};
pub use init::{init_tracing, stdio_requested, STDIO_MODE_FLAG};
pub use result::{json_success, sampled_text, text_success};

pub use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
