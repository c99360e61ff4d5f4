//! Tracing setup and the `serve_stdio!` entry point

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Argument the client passes to select the stdio transport
pub const STDIO_MODE_FLAG: &str = "stdio";

/// Initialize tracing, always on stderr since stdout carries the protocol.
///
/// `crate_name` gets an `info` default directive; `RUST_LOG` adds to it.
/// Set `LOG_FORMAT=json` for JSON lines.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }

    Ok(())
}

/// Whether the first argument is the stdio mode flag
pub fn stdio_requested<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .nth(1)
        .is_some_and(|arg| arg.as_ref() == STDIO_MODE_FLAG)
}

/// Generate `main` for an MCP server served over stdio.
///
/// Stdio is the only transport, so a missing `stdio` flag is logged and
/// serving continues.
///
/// ```rust,ignore
/// mcp_common::serve_stdio!(MyMcpServer, "my_mcp");
/// ```
#[macro_export]
macro_rules! serve_stdio {
    ($server_type:ty, $crate_name:expr) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            $crate::init_tracing($crate_name)?;

            if !$crate::stdio_requested(std::env::args()) {
                tracing::debug!("No '{}' flag given, serving stdio anyway", $crate::STDIO_MODE_FLAG);
            }
            tracing::info!(concat!("Starting ", $crate_name, " MCP Server"));

            let server = <$server_type>::new();
            let service = server.serve(rmcp::transport::stdio()).await?;

            service.waiting().await?;

            tracing::info!("Server shutting down");
            Ok(())
        }
    };
}
