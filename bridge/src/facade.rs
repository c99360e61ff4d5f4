//! Typed wrappers over [`Supervisor::invoke`]
//!
//! Each tool declares its name, required fields and defaults. Cancellation is
//! checked once on entry: a cancelled call returns an empty string without
//! touching the supervisor, and a call already in flight runs to completion.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::diagnostics::DiagnosticSink;
use crate::error::{BridgeError, BridgeResult};
use crate::supervisor::Supervisor;

pub const GREET_TOOL: &str = "greet";
pub const GENERATE_STORY_TOOL: &str = "generate_story";
pub const QUERY_HTML_TOOL: &str = "query_html";

/// Tools the facade relies on, checked at every handshake
pub const FACADE_TOOLS: &[&str] = &[GREET_TOOL, GENERATE_STORY_TOOL, QUERY_HTML_TOOL];

pub const DEFAULT_GREET_NAME: &str = "World";
pub const DEFAULT_STORY_TOKENS: u32 = 300;
pub const DEFAULT_SELECTOR: &str = "body";

/// Call shape of one server tool
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub required: Vec<String>,
    pub defaults: Map<String, Value>,
    /// Renders the progress line from the prepared arguments
    progress: Option<fn(&Map<String, Value>) -> String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            defaults: Map::new(),
            progress: None,
        }
    }

    pub fn require(mut self, field: &str) -> Self {
        self.required.push(field.to_string());
        self
    }

    pub fn with_default(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.defaults.insert(field.to_string(), value.into());
        self
    }

    fn with_progress(mut self, render: fn(&Map<String, Value>) -> String) -> Self {
        self.progress = Some(render);
        self
    }

    pub fn greet() -> Self {
        Self::new(GREET_TOOL)
            .with_default("name", DEFAULT_GREET_NAME)
            .with_progress(|args| format!("Greeting {} via MCP...", display_arg(args, "name")))
    }

    pub fn generate_story() -> Self {
        Self::new(GENERATE_STORY_TOOL)
            .require("topic")
            .with_default("max_tokens", DEFAULT_STORY_TOKENS)
            .with_progress(|args| {
                format!("Generating a story about {} via MCP...", display_arg(args, "topic"))
            })
    }

    pub fn query_html() -> Self {
        Self::new(QUERY_HTML_TOOL)
            .require("html")
            .with_default("selector", DEFAULT_SELECTOR)
            .with_progress(|args| {
                format!("Querying HTML for '{}' via MCP...", display_arg(args, "selector"))
            })
    }

    /// Fill defaults for absent or null fields and check required ones
    pub fn prepare(&self, mut arguments: Map<String, Value>) -> BridgeResult<Map<String, Value>> {
        for (field, value) in &self.defaults {
            let missing = arguments.get(field).map_or(true, Value::is_null);
            if missing {
                arguments.insert(field.clone(), value.clone());
            }
        }

        if let Some(field) = self
            .required
            .iter()
            .find(|field| arguments.get(*field).map_or(true, Value::is_null))
        {
            return Err(BridgeError::MissingArgument {
                tool: self.name.clone(),
                field: field.clone(),
            });
        }

        Ok(arguments)
    }

    pub fn progress_message(&self, arguments: &Map<String, Value>) -> String {
        match self.progress {
            Some(render) => render(arguments),
            None => format!("Calling {} via MCP...", self.name),
        }
    }
}

fn display_arg(args: &Map<String, Value>, field: &str) -> String {
    match args.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Convenience calls for the tools the server is expected to expose
#[derive(Clone)]
pub struct ToolFacade {
    supervisor: Arc<Supervisor>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ToolFacade {
    pub fn new(supervisor: Arc<Supervisor>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { supervisor, sink }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Run `spec` with `arguments`. Returns an empty string if `cancel` has
    /// already fired.
    pub async fn invoke_spec(
        &self,
        spec: &ToolSpec,
        arguments: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> BridgeResult<String> {
        if cancel.is_cancelled() {
            tracing::debug!(tool = %spec.name, "Cancelled before call");
            return Ok(String::new());
        }

        let arguments = spec.prepare(arguments)?;
        self.sink.line(&spec.progress_message(&arguments));
        self.supervisor.invoke(&spec.name, arguments).await
    }

    pub async fn greet(&self, name: Option<&str>, cancel: &CancellationToken) -> BridgeResult<String> {
        let mut args = Map::new();
        if let Some(name) = name {
            args.insert("name".into(), name.into());
        }
        self.invoke_spec(&ToolSpec::greet(), args, cancel).await
    }

    pub async fn generate_story(
        &self,
        topic: &str,
        max_tokens: Option<u32>,
        cancel: &CancellationToken,
    ) -> BridgeResult<String> {
        let mut args = Map::new();
        args.insert("topic".into(), topic.into());
        if let Some(max_tokens) = max_tokens {
            args.insert("max_tokens".into(), max_tokens.into());
        }
        self.invoke_spec(&ToolSpec::generate_story(), args, cancel).await
    }

    pub async fn query_html(
        &self,
        html: &str,
        selector: Option<&str>,
        cancel: &CancellationToken,
    ) -> BridgeResult<String> {
        let mut args = Map::new();
        args.insert("html".into(), html.into());
        if let Some(selector) = selector {
            args.insert("selector".into(), selector.into());
        }
        self.invoke_spec(&ToolSpec::query_html(), args, cancel).await
    }
}
