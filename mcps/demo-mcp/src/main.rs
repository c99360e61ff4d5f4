//! Demo MCP Server
//!
//! Run with the `stdio` argument, as the bridge does.

use demo_mcp::DemoMcpServer;

mcp_common::serve_stdio!(DemoMcpServer, "demo_mcp");
