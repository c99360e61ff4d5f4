//! Demo MCP Library
//!
//! The server the bridge supervises: `greet`, `query_html`, and
//! `generate_story`, which asks the client to sample a completion.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use demo_mcp::DemoMcpServer;
//! use rmcp::ServiceExt;
//!
//! let service = DemoMcpServer::new().serve(transport).await?;
//! ```

pub mod server;

pub use server::DemoMcpServer;
pub use server::{GreetParams, QueryHtmlParams, StoryParams};
