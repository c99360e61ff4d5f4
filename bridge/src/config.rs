//! Configuration loading (.bridge.toml)

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BridgeError, BridgeResult};
use crate::launch::LaunchTarget;
use crate::sampling::ModelSettings;
use crate::session::RmcpConnector;

/// File name searched for by [`BridgeFileConfig::load`]
pub const CONFIG_FILE: &str = ".bridge.toml";

/// Environment variable naming the interpreter when none is configured
pub const PYTHON_ENV: &str = "MCP_PYTHON";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/mcp-bridge/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("mcp-bridge").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

/// Top-level bridge configuration (from .bridge.toml)
#[derive(Debug, Default, Deserialize)]
pub struct BridgeFileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub models: ModelsSection,
    #[serde(default)]
    pub ollama: OllamaSection,
}

/// MCP server launch section
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Explicit server script or binary
    pub path: Option<PathBuf>,
    /// Interpreter for `path`
    pub interpreter: Option<String>,
    /// Project root; `<workspace>/python_server/server.py` is tried when `path` is unset
    pub workspace: Option<PathBuf>,
    /// Last resort server location
    pub fallback_path: Option<PathBuf>,
    #[serde(default = "default_required_tools")]
    pub required_tools: Vec<String>,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

/// Model selection section
#[derive(Debug, Deserialize)]
pub struct ModelsSection {
    #[serde(default = "default_vendor")]
    pub vendor: String,
    pub default_model: Option<String>,
    #[serde(default)]
    pub preferred_families: Vec<String>,
}

/// Ollama section
#[derive(Debug, Deserialize)]
pub struct OllamaSection {
    #[serde(default = "default_ollama_url")]
    pub url: String,
}

// Default value functions
fn default_required_tools() -> Vec<String> {
    vec!["greet".to_string()]
}

fn default_startup_timeout() -> u64 {
    30
}

fn default_call_timeout() -> u64 {
    120
}

fn default_vendor() -> String {
    "ollama".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            path: None,
            interpreter: None,
            workspace: None,
            fallback_path: None,
            required_tools: default_required_tools(),
            startup_timeout_secs: default_startup_timeout(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl Default for ModelsSection {
    fn default() -> Self {
        Self {
            vendor: default_vendor(),
            default_model: None,
            preferred_families: Vec::new(),
        }
    }
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
        }
    }
}

impl BridgeFileConfig {
    /// Load config from .bridge.toml, defaults when no file exists
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE) {
            tracing::debug!("Loading bridge config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeFileConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn non_blank_path(value: &Option<PathBuf>) -> Option<&Path> {
    value
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty())
}

impl ServerSection {
    /// Server location: `path`, then the workspace layout, then `fallback_path`
    pub fn resolve_path(&self) -> BridgeResult<PathBuf> {
        if let Some(path) = non_blank_path(&self.path) {
            return Ok(path.to_path_buf());
        }
        if let Some(workspace) = non_blank_path(&self.workspace) {
            return Ok(workspace.join("python_server").join("server.py"));
        }
        if let Some(fallback) = non_blank_path(&self.fallback_path) {
            return Ok(fallback.to_path_buf());
        }
        Err(BridgeError::Config(
            "could not resolve the MCP server path; set server.path in .bridge.toml or MCP_SERVER_PATH"
                .to_string(),
        ))
    }

    /// Interpreter for `server_path`, reading `MCP_PYTHON` from the environment
    pub fn resolve_interpreter(&self, server_path: &Path) -> Option<String> {
        let env = std::env::var(PYTHON_ENV).ok();
        pick_interpreter(self.interpreter.as_deref(), env.as_deref(), server_path)
    }

    pub fn launch_target(&self) -> BridgeResult<LaunchTarget> {
        let path = self.resolve_path()?;
        let interpreter = self.resolve_interpreter(&path);
        Ok(LaunchTarget::new(path, interpreter))
    }

    pub fn connector(&self) -> RmcpConnector {
        RmcpConnector {
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            tool_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

/// Configured interpreter, then the environment, then `python3` for `.py`
/// scripts. Anything else runs directly.
pub fn pick_interpreter(configured: Option<&str>, env: Option<&str>, server_path: &Path) -> Option<String> {
    if let Some(interpreter) = non_blank(configured).or_else(|| non_blank(env)) {
        return Some(interpreter.to_string());
    }
    let is_python = server_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("py"));
    is_python.then(|| "python3".to_string())
}

impl ModelsSection {
    pub fn settings(&self) -> ModelSettings {
        ModelSettings {
            vendor: self.vendor.clone(),
            default_model: non_blank(self.default_model.as_deref()).map(str::to_string),
            preferred_families: self.preferred_families.clone(),
        }
    }
}
