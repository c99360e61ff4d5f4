//! Line-oriented diagnostics sink
//!
//! The supervisor reports every connect/disconnect transition here and the
//! capability bridge writes its selection attempts, one line each, in order.

use std::sync::{Arc, Mutex};

/// Receiver for human-readable diagnostic lines
pub trait DiagnosticSink: Send + Sync {
    /// Append one line
    fn line(&self, line: &str);
}

/// Forwards each line to `tracing` under the `mcp_bridge::output` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn line(&self, line: &str) {
        tracing::info!(target: "mcp_bridge::output", "{}", line);
    }
}

/// Keeps every line in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines received so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for MemorySink {
    fn line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.line("first");
        sink.line("second");

        let clone = sink.clone();
        clone.line("third");

        assert_eq!(sink.lines(), vec!["first", "second", "third"]);
    }
}
