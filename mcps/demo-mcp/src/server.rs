//! MCP Server implementation for the demo tools

use mcp_common::{internal_error, invalid_params, sampled_text, text_success, ResultExt};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, CreateMessageRequestParam, ServerCapabilities, ServerInfo},
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The demo MCP server
#[derive(Clone)]
pub struct DemoMcpServer {
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Parameter Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GreetParams {
    #[schemars(description = "Who to greet")]
    #[serde(default = "default_name")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoryParams {
    #[schemars(description = "What the story is about")]
    pub topic: String,

    #[schemars(description = "Token budget for the story")]
    #[serde(default = "default_story_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryHtmlParams {
    #[schemars(description = "HTML document or fragment")]
    pub html: String,

    #[schemars(description = "CSS selector (default: body)")]
    #[serde(default = "default_selector")]
    pub selector: String,
}

fn default_name() -> String {
    "World".to_string()
}

fn default_story_tokens() -> u32 {
    300
}

fn default_selector() -> String {
    "body".to_string()
}

// ============================================================================
// Helpers
// ============================================================================

fn greeting(name: &str) -> String {
    format!("Hello, {}! From Rust MCP.", name)
}

/// Sampling request for a story, in wire form
fn story_request(params: &StoryParams) -> serde_json::Value {
    serde_json::json!({
        "messages": [{
            "role": "user",
            "content": {
                "type": "text",
                "text": format!("Write a short story about {}.", params.topic),
            },
        }],
        "systemPrompt": "You are a storyteller. Keep it short and vivid.",
        "maxTokens": params.max_tokens,
    })
}

/// Text content of every element matching `selector`, one per line
fn select_text(html: &str, selector: &str) -> Result<Vec<String>, McpError> {
    let document = scraper::Html::parse_document(html);
    let css_selector = scraper::Selector::parse(selector)
        .map_err(|e| invalid_params(format!("Invalid CSS selector '{}': {:?}", selector, e)))?;

    Ok(document
        .select(&css_selector)
        .map(|el| el.text().collect::<Vec<_>>().join("").trim().to_string())
        .collect())
}

// ============================================================================
// Tool Router Implementation
// ============================================================================

#[tool_router]
impl DemoMcpServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Return a friendly greeting")]
    async fn greet(
        &self,
        Parameters(params): Parameters<GreetParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_success(greeting(&params.name)))
    }

    #[tool(description = "Write a short story about a topic using the client's language model")]
    async fn generate_story(
        &self,
        Parameters(params): Parameters<StoryParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let request: CreateMessageRequestParam =
            serde_json::from_value(story_request(&params)).mcp_context("invalid sampling request")?;

        tracing::info!(topic = %params.topic, "Requesting story from client");
        let result = context
            .peer
            .create_message(request)
            .await
            .mcp_context("sampling failed")?;

        let raw = serde_json::to_value(&result).mcp_context("unreadable sampling result")?;
        let story = sampled_text(&raw).ok_or_else(|| internal_error("sampling returned no text"))?;
        Ok(text_success(story))
    }

    #[tool(description = "Extract the text of every element matching a CSS selector")]
    async fn query_html(
        &self,
        Parameters(params): Parameters<QueryHtmlParams>,
    ) -> Result<CallToolResult, McpError> {
        let matches = select_text(&params.html, &params.selector)?;
        if matches.is_empty() {
            return Ok(text_success(format!(
                "No elements match '{}'",
                params.selector
            )));
        }
        Ok(text_success(matches.join("\n")))
    }
}

impl Default for DemoMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for DemoMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Demo MCP server. generate_story needs a client that supports sampling.".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
