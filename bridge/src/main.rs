use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use mcp_bridge::config::BridgeFileConfig;
use mcp_bridge::provider::ModelProvider;
use mcp_bridge::sampling::{resolve_model, SamplingMetadata};
use mcp_bridge::{
    BridgeError, CapabilityBridge, DiagnosticSink, Supervisor, ToolFacade, TracingSink,
};

#[derive(Parser)]
#[command(name = "mcp-bridge")]
#[command(about = "Supervised MCP client that answers sampling requests with local models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: search for .bridge.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// MCP server script or binary
    #[arg(long, global = true, env = "MCP_SERVER_PATH")]
    server_path: Option<PathBuf>,

    /// Interpreter for the server script
    #[arg(long, global = true)]
    python: Option<String>,

    /// Project root containing python_server/server.py
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Default model id for sampling requests
    #[arg(long, global = true, env = "MCP_DEFAULT_MODEL")]
    model: Option<String>,

    /// Ollama server URL
    #[arg(long, global = true, env = "OLLAMA_URL")]
    ollama_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server, verify its tools, and report
    Probe,
    /// Call the greet tool
    Greet {
        /// Who to greet (default: World)
        name: Option<String>,
    },
    /// Ask the server for a story (the server samples back through this client)
    Story {
        /// Story topic
        topic: String,
        /// Token budget for the story
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Run a CSS selector over an HTML document
    QueryHtml {
        /// HTML text (reads --file or stdin when omitted)
        html: Option<String>,
        /// Read HTML from a file
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// CSS selector (default: body)
        #[arg(long, short)]
        selector: Option<String>,
    },
    /// List the server's tools
    Tools,
    /// Call any tool directly
    Call {
        /// Tool name
        tool: String,
        /// Arguments as JSON
        #[arg(long, short)]
        args: Option<String>,
    },
    /// Show which model a sampling request would get
    Models {
        /// Preferred model id, as a server would send it
        #[arg(long)]
        prefer: Option<String>,
        /// Preferred families, in order
        #[arg(long = "family")]
        families: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    mcp_common::init_tracing("mcp_bridge")?;

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let sink: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);
    let provider = build_provider(&config)?;

    if let Commands::Models { prefer, families } = &cli.command {
        return run_models(provider.as_ref(), &config, prefer.clone(), families.clone()).await;
    }

    let bridge = CapabilityBridge::new(provider, config.models.settings(), sink.clone());
    let supervisor = Arc::new(
        Supervisor::new(
            config.server.launch_target()?,
            Arc::new(config.server.connector()),
            Arc::new(bridge),
        )
        .with_required_tools(config.server.required_tools.clone())
        .with_sink(sink.clone()),
    );
    let facade = ToolFacade::new(supervisor.clone(), sink);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, pending calls will finish");
            on_signal.cancel();
        }
    });

    let outcome = run(cli.command, &facade, &cancel).await;
    supervisor.stop().await;

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("{}", hint);
            }
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<BridgeFileConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeFileConfig::load_from_path(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BridgeFileConfig::load()?,
    };

    if let Some(path) = &cli.server_path {
        config.server.path = Some(path.clone());
    }
    if let Some(python) = &cli.python {
        config.server.interpreter = Some(python.clone());
    }
    if let Some(workspace) = &cli.workspace {
        config.server.workspace = Some(workspace.clone());
    }
    if let Some(model) = &cli.model {
        config.models.default_model = Some(model.clone());
    }
    if let Some(url) = &cli.ollama_url {
        config.ollama.url = url.clone();
    }

    Ok(config)
}

#[cfg(feature = "ollama")]
fn build_provider(config: &BridgeFileConfig) -> Result<Arc<dyn ModelProvider>> {
    let provider = mcp_bridge::provider::OllamaProvider::new(&config.ollama.url)?;
    tracing::debug!("Using Ollama at {}", provider.base_url());
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "ollama"))]
fn build_provider(_config: &BridgeFileConfig) -> Result<Arc<dyn ModelProvider>> {
    tracing::warn!("Built without a model provider, sampling requests will fail");
    Ok(Arc::new(mcp_bridge::provider::NoProvider))
}

async fn run(command: Commands, facade: &ToolFacade, cancel: &CancellationToken) -> Result<(), BridgeError> {
    match command {
        Commands::Probe => {
            match facade.supervisor().ensure_connected().await {
                Ok(live) => {
                    println!("MCP server ready ({} tools)", live.tools.len());
                }
                Err(e) => {
                    let hint = e.hint().unwrap_or_default();
                    tracing::warn!("MCP server not started: {} {}", e, hint);
                    return Err(e);
                }
            }
        }
        Commands::Greet { name } => {
            println!("{}", facade.greet(name.as_deref(), cancel).await?);
        }
        Commands::Story { topic, max_tokens } => {
            println!("{}", facade.generate_story(&topic, max_tokens, cancel).await?);
        }
        Commands::QueryHtml {
            html,
            file,
            selector,
        } => {
            let html = read_html(html, file)?;
            println!("{}", facade.query_html(&html, selector.as_deref(), cancel).await?);
        }
        Commands::Tools => {
            let tools = facade.supervisor().list_tools().await?;
            if tools.is_empty() {
                println!("No tools found.");
            }
            for tool in tools {
                let desc = tool
                    .description
                    .as_deref()
                    .unwrap_or("No description")
                    .lines()
                    .next()
                    .unwrap_or("");
                println!("  {} - {}", tool.name, desc);
            }
        }
        Commands::Call { tool, args } => {
            let arguments = parse_args(args.as_deref())?;
            let spec = mcp_bridge::ToolSpec::new(tool);
            println!("{}", facade.invoke_spec(&spec, arguments, cancel).await?);
        }
        Commands::Models { .. } => {}
    }
    Ok(())
}

fn read_html(html: Option<String>, file: Option<PathBuf>) -> Result<String, BridgeError> {
    if let Some(html) = html {
        return Ok(html);
    }
    let read = match &file {
        Some(path) => std::fs::read_to_string(path),
        None => std::io::read_to_string(std::io::stdin()),
    };
    read.map_err(|e| BridgeError::Config(format!("failed to read HTML input: {}", e)))
}

fn parse_args(raw: Option<&str>) -> Result<Map<String, Value>, BridgeError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(BridgeError::Config("--args must be a JSON object".to_string())),
        Err(e) => Err(BridgeError::Config(format!("invalid --args JSON: {}", e))),
    }
}

async fn run_models(
    provider: &dyn ModelProvider,
    config: &BridgeFileConfig,
    prefer: Option<String>,
    families: Vec<String>,
) -> Result<()> {
    let meta = SamplingMetadata {
        preferred_model: prefer,
        preferred_families: families,
    };

    match resolve_model(provider, &config.models.settings(), &meta).await {
        Ok((model, log)) => {
            for line in log.lines() {
                println!("  {}", line);
            }
            println!("Selected: {} (family: {})", model.id, model.family);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
