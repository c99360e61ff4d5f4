//! Error helpers for MCP tool implementations

use std::fmt::Display;

use rmcp::ErrorData as McpError;

/// Type alias for MCP tool results
pub type McpResult<T> = Result<T, McpError>;

/// Internal error with a message
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// Invalid params error, for bad tool arguments
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}

/// Convert any displayable error into an internal MCP error, prefixed with
/// what was being attempted.
///
/// ```rust,ignore
/// use mcp_common::ResultExt;
///
/// let result = peer.create_message(params).await.mcp_context("sampling failed")?;
/// ```
pub trait ResultExt<T> {
    fn mcp_context(self, what: &str) -> McpResult<T>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn mcp_context(self, what: &str) -> McpResult<T> {
        self.map_err(|e| internal_error(format!("{}: {}", what, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_context_prefixes_message() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"));
        let err = result.mcp_context("sampling failed").unwrap_err();
        assert_eq!(err.message, "sampling failed: pipe closed");
    }

    #[test]
    fn test_invalid_params() {
        let err = invalid_params("bad selector");
        assert!(err.message.contains("bad selector"));
    }
}
