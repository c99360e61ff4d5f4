//! E2E test: rmcp session against the demo server over a duplex pipe

use std::sync::Arc;

use mcp_bridge::diagnostics::MemorySink;
use mcp_bridge::provider::NoProvider;
use mcp_bridge::sampling::{CapabilityBridge, ModelSettings};
use mcp_bridge::session::ProtocolSession;
use mcp_bridge::BridgeError;
use serde_json::{json, Map, Value};

use crate::support::{in_process_session, ScriptedModels};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn bridge_with(provider: Arc<dyn mcp_bridge::provider::ModelProvider>, sink: &MemorySink) -> Arc<CapabilityBridge> {
    Arc::new(CapabilityBridge::new(provider, ModelSettings::default(), Arc::new(sink.clone())))
}

#[tokio::test]
async fn test_lists_demo_tools() {
    let sink = MemorySink::new();
    let session = in_process_session(bridge_with(Arc::new(NoProvider), &sink))
        .await
        .expect("handshake");

    let tools = session.list_tools().await.expect("list tools");
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    for expected in ["greet", "generate_story", "query_html"] {
        assert!(names.contains(&expected), "missing {}", expected);
    }

    session.close().await;
}

#[tokio::test]
async fn test_greet_round_trip() {
    let sink = MemorySink::new();
    let session = in_process_session(bridge_with(Arc::new(NoProvider), &sink))
        .await
        .expect("handshake");

    let output = session
        .call_tool("greet", args(json!({"name": "Ada"})))
        .await
        .expect("call greet");
    assert_eq!(output.into_text(), "Hello, Ada! From Rust MCP.");

    let output = session.call_tool("greet", Map::new()).await.expect("call greet");
    assert_eq!(output.into_text(), "Hello, World! From Rust MCP.");

    session.close().await;
    session.close().await;
}

#[tokio::test]
async fn test_query_html_round_trip() {
    let sink = MemorySink::new();
    let session = in_process_session(bridge_with(Arc::new(NoProvider), &sink))
        .await
        .expect("handshake");

    let output = session
        .call_tool(
            "query_html",
            args(json!({"html": "<ul><li>red</li><li>blue</li></ul>", "selector": "li"})),
        )
        .await
        .expect("call query_html");
    assert_eq!(output.into_text(), "red\nblue");

    session.close().await;
}

#[tokio::test]
async fn test_story_samples_through_bridge() {
    let sink = MemorySink::new();
    let provider = Arc::new(ScriptedModels::new("Once upon a time there was a lighthouse."));
    let session = in_process_session(bridge_with(provider, &sink))
        .await
        .expect("handshake");

    let output = session
        .call_tool("generate_story", args(json!({"topic": "a lighthouse", "max_tokens": 50})))
        .await
        .expect("call generate_story");
    assert_eq!(output.into_text(), "Once upon a time there was a lighthouse.");

    let lines = sink.lines();
    assert!(lines.iter().any(|l| l.starts_with("Sampling request: 1 message(s)")));
    assert!(lines
        .iter()
        .any(|l| l == "Model selection: vendor=ollama family=llama: selected llama3.1:8b"));

    session.close().await;
}

#[tokio::test]
async fn test_story_without_models_fails_with_attempts() {
    let sink = MemorySink::new();
    let session = in_process_session(bridge_with(Arc::new(NoProvider), &sink))
        .await
        .expect("handshake");

    let err = session
        .call_tool("generate_story", args(json!({"topic": "nothing"})))
        .await
        .expect_err("no model should fail the tool");

    assert!(matches!(err, BridgeError::ToolInvocation { .. }));
    assert!(err.to_string().contains("no language model available"));
    assert!(sink.lines().iter().any(|l| l.contains("vendor=ollama family=gemma: no match")));

    session.close().await;
}
