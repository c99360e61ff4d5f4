//! E2E test: supervisor and facade over in-process sessions

use std::sync::Arc;

use mcp_bridge::diagnostics::MemorySink;
use mcp_bridge::facade::FACADE_TOOLS;
use mcp_bridge::sampling::{CapabilityBridge, ModelSettings};
use mcp_bridge::{ConnectionState, LaunchTarget, Supervisor, ToolFacade};
use tokio_util::sync::CancellationToken;

use crate::support::{placeholder_server, InProcessConnector, ScriptedModels};

struct Stack {
    _dir: tempfile::TempDir,
    connector: Arc<InProcessConnector>,
    sink: MemorySink,
    facade: ToolFacade,
}

fn stack(reply: &str) -> Stack {
    let dir = tempfile::tempdir().expect("tempdir");
    let connector = Arc::new(InProcessConnector::default());
    let sink = MemorySink::new();

    let bridge = CapabilityBridge::new(
        Arc::new(ScriptedModels::new(reply)),
        ModelSettings::default(),
        Arc::new(sink.clone()),
    );
    let supervisor = Supervisor::new(
        LaunchTarget::new(placeholder_server(&dir), None),
        connector.clone(),
        Arc::new(bridge),
    )
    .with_required_tools(FACADE_TOOLS.iter().copied())
    .with_sink(Arc::new(sink.clone()));

    Stack {
        _dir: dir,
        connector,
        sink: sink.clone(),
        facade: ToolFacade::new(Arc::new(supervisor), Arc::new(sink)),
    }
}

#[tokio::test]
async fn test_facade_calls_share_one_connection() {
    let stack = stack("unused");
    let cancel = CancellationToken::new();

    let (a, b, c) = tokio::join!(
        stack.facade.greet(Some("Ada"), &cancel),
        stack.facade.greet(None, &cancel),
        stack.facade.query_html("<p>hi</p>", Some("p"), &cancel),
    );

    assert_eq!(a.expect("greet"), "Hello, Ada! From Rust MCP.");
    assert_eq!(b.expect("greet"), "Hello, World! From Rust MCP.");
    assert_eq!(c.expect("query_html"), "hi");
    assert_eq!(stack.connector.spawns(), 1);
    assert_eq!(stack.facade.supervisor().state(), ConnectionState::Connected);

    stack.facade.supervisor().stop().await;
}

#[tokio::test]
async fn test_story_via_facade() {
    let stack = stack("A short tale.");
    let story = stack
        .facade
        .generate_story("the sea", None, &CancellationToken::new())
        .await
        .expect("story");

    assert_eq!(story, "A short tale.");
    assert!(stack
        .sink
        .lines()
        .contains(&"Generating a story about the sea via MCP...".to_string()));

    stack.facade.supervisor().stop().await;
}

#[tokio::test]
async fn test_reconnects_after_stop() {
    let stack = stack("unused");
    let cancel = CancellationToken::new();

    stack.facade.greet(None, &cancel).await.expect("first greet");
    stack.facade.supervisor().stop().await;
    assert_eq!(stack.facade.supervisor().state(), ConnectionState::Disconnected);

    stack.facade.greet(None, &cancel).await.expect("second greet");
    assert_eq!(stack.connector.spawns(), 2);

    stack.facade.supervisor().stop().await;
}
