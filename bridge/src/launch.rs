//! Transport launcher
//!
//! Describes how to start the MCP server subprocess. The server always
//! receives the `stdio` mode flag as its last argument.

use std::path::PathBuf;

use tokio::process::Command;

use crate::error::{BridgeError, BridgeResult};

pub use mcp_common::STDIO_MODE_FLAG;

/// A resolved server launch: the script/binary plus an optional interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    /// Server script or executable
    pub server_path: PathBuf,
    /// Interpreter that runs `server_path` (e.g. `python3`); `None` executes it directly
    pub interpreter: Option<String>,
}

impl LaunchTarget {
    pub fn new(server_path: impl Into<PathBuf>, interpreter: Option<String>) -> Self {
        Self {
            server_path: server_path.into(),
            interpreter,
        }
    }

    /// Fail with `TransportSpawn` when the server file does not exist
    pub fn verify(&self) -> BridgeResult<()> {
        if self.server_path.exists() {
            Ok(())
        } else {
            Err(BridgeError::TransportSpawn {
                path: self.server_path.display().to_string(),
                reason: "server file not found".to_string(),
            })
        }
    }

    /// Program name that will be executed
    pub fn program(&self) -> &str {
        match &self.interpreter {
            Some(interpreter) => interpreter,
            None => self.server_path.to_str().unwrap_or_default(),
        }
    }

    /// Argument list passed to [`program`](Self::program)
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(2);
        if self.interpreter.is_some() {
            args.push(self.server_path.display().to_string());
        }
        args.push(STDIO_MODE_FLAG.to_string());
        args
    }

    /// Build the child process command. The child is killed when dropped so a
    /// failed handshake never leaves a server running.
    pub fn command(&self) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => Command::new(interpreter),
            None => Command::new(&self.server_path),
        };
        cmd.args(self.args()).kill_on_drop(true);
        cmd
    }

    /// Lines describing the launch for the diagnostics sink
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec!["Starting MCP server:".to_string()];
        if let Some(interpreter) = &self.interpreter {
            lines.push(format!("  Interpreter: {}", interpreter));
        }
        lines.push(format!(
            "  Script: {} ({})",
            self.server_path.display(),
            STDIO_MODE_FLAG
        ));
        lines
    }
}
