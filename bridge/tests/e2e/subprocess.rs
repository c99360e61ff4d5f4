//! E2E test: the demo-mcp binary spawned over stdio

use std::path::PathBuf;
use std::sync::Arc;

use mcp_bridge::diagnostics::MemorySink;
use mcp_bridge::provider::NoProvider;
use mcp_bridge::sampling::{CapabilityBridge, ModelSettings};
use mcp_bridge::session::RmcpConnector;
use mcp_bridge::{BridgeError, LaunchTarget, Supervisor};
use serde_json::{json, Map};

/// Get the workspace root directory (contains target/ and Cargo.toml with [workspace])
fn workspace_root() -> PathBuf {
    let mut current = std::env::current_dir().expect("Failed to get cwd");

    loop {
        let has_target = current.join("target").is_dir();
        let has_cargo = current.join("Cargo.toml").exists();
        let has_bridge_subdir = current.join("bridge").is_dir();

        if has_target && has_cargo && has_bridge_subdir {
            return current;
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    std::env::current_dir().expect("Failed to get cwd")
}

fn demo_binary() -> PathBuf {
    let root = workspace_root();
    let debug = root.join("target/debug/demo-mcp");
    if debug.exists() {
        return debug;
    }
    root.join("target/release/demo-mcp")
}

fn supervisor(target: LaunchTarget, sink: &MemorySink) -> Supervisor {
    let bridge = CapabilityBridge::new(
        Arc::new(NoProvider),
        ModelSettings::default(),
        Arc::new(sink.clone()),
    );
    Supervisor::new(target, Arc::new(RmcpConnector::default()), Arc::new(bridge))
        .with_required_tools(["greet"])
        .with_sink(Arc::new(sink.clone()))
}

#[tokio::test]
#[ignore = "requires cargo build --workspace"]
async fn test_greet_over_stdio() {
    let sink = MemorySink::new();
    let supervisor = supervisor(LaunchTarget::new(demo_binary(), None), &sink);

    let mut args = Map::new();
    args.insert("name".into(), json!("Rust"));
    let text = supervisor.invoke("greet", args).await.expect("greet");

    assert_eq!(text, "Hello, Rust! From Rust MCP.");
    assert!(sink.lines().iter().any(|l| l.ends_with("(stdio)")));

    supervisor.stop().await;
}

#[tokio::test]
#[ignore = "requires cargo build --workspace"]
async fn test_missing_required_tool_over_stdio() {
    let sink = MemorySink::new();
    let supervisor = supervisor(LaunchTarget::new(demo_binary(), None), &sink)
        .with_required_tools(["greet", "translate"]);

    let err = supervisor.ensure_connected().await.expect_err("handshake must fail");
    assert!(matches!(err, BridgeError::Handshake(_)));
    assert!(err.to_string().contains("translate"));
}

#[tokio::test]
async fn test_missing_binary_is_spawn_error() {
    let sink = MemorySink::new();
    let supervisor = supervisor(LaunchTarget::new("/nonexistent/demo-mcp", None), &sink);

    let err = supervisor.ensure_connected().await.expect_err("must fail");
    assert!(matches!(err, BridgeError::TransportSpawn { .. }));
    assert!(err.hint().is_some());
}
