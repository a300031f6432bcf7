//! Adapter exposing remote MCP tools as [`ToolExecutor`]s
//!
//! Each tool returned by `tools/list` becomes one [`McpToolExecutor`]
//! registered under the tool's own name. Executing it issues `tools/call`
//! on the shared session and flattens the content blocks into the text the
//! model sees.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::mcp::protocol::InitializedMcpProtocol;
use crate::mcp::session::McpSession;
use crate::mcp::types::{CallToolResponse, McpTool, ToolResponseContent};
use crate::tools::{Tool, ToolExecutor, ToolRegistry, ToolResult};

/// One remote MCP tool
#[derive(Debug)]
pub struct McpToolExecutor {
    protocol: Arc<InitializedMcpProtocol>,
    tool: McpTool,
}

impl McpToolExecutor {
    /// Wrap `tool` so calls go through `protocol`
    pub fn new(protocol: Arc<InitializedMcpProtocol>, tool: McpTool) -> Self {
        Self { protocol, tool }
    }

    /// Name of the remote tool
    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    fn tool_definition(&self) -> serde_json::Value {
        let description = self
            .tool
            .description
            .clone()
            .or_else(|| self.tool.title.clone())
            .unwrap_or_default();
        Tool::new(
            self.tool.name.clone(),
            description,
            normalize_schema(&self.tool.input_schema),
        )
        .to_definition()
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let arguments = match args {
            serde_json::Value::Null => None,
            serde_json::Value::Object(map) => Some(serde_json::Value::Object(map)),
            other => {
                return Ok(ToolResult::error(format!(
                    "arguments for '{}' must be a JSON object, got {}",
                    self.tool.name, other
                )))
            }
        };

        tracing::debug!(tool = %self.tool.name, "calling MCP tool");
        let response = self
            .protocol
            .call_tool(&self.tool.name, arguments, None)
            .await?;
        Ok(flatten_response(&response))
    }
}

/// Providers require an object schema; MCP servers sometimes omit `type`.
fn normalize_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => {
            let mut map = map.clone();
            map.entry("type")
                .or_insert_with(|| serde_json::Value::String("object".to_string()));
            if map.get("type").and_then(|t| t.as_str()) == Some("object") {
                map.entry("properties")
                    .or_insert_with(|| serde_json::json!({}));
            }
            serde_json::Value::Object(map)
        }
        _ => serde_json::json!({ "type": "object", "properties": {} }),
    }
}

/// Flatten a `tools/call` result into the text handed back to the model
///
/// Text blocks are joined with newlines and text resources are inlined.
/// Binary blocks become short placeholders. When there is no text at all,
/// `structuredContent` is rendered as JSON.
pub fn flatten_response(response: &CallToolResponse) -> ToolResult {
    let parts: Vec<String> = response
        .content
        .iter()
        .map(|block| match block {
            ToolResponseContent::Text { text } => text.clone(),
            ToolResponseContent::Image { mime_type, .. } => format!("[image: {}]", mime_type),
            ToolResponseContent::Audio { mime_type, .. } => format!("[audio: {}]", mime_type),
            ToolResponseContent::Resource { resource } => match &resource.text {
                Some(text) => text.clone(),
                None => format!("[resource: {}]", resource.uri),
            },
            ToolResponseContent::ResourceLink { uri, name } if name.is_empty() => {
                format!("[resource link: {}]", uri)
            }
            ToolResponseContent::ResourceLink { uri, name } => {
                format!("[resource link: {} ({})]", name, uri)
            }
        })
        .collect();

    let mut output = parts.join("\n");
    if output.trim().is_empty() {
        if let Some(structured) = &response.structured_content {
            output = structured.to_string();
        }
    }

    if response.is_error.unwrap_or(false) {
        let message = if output.is_empty() {
            "tool reported an error".to_string()
        } else {
            output
        };
        ToolResult::error(message)
    } else {
        ToolResult::success(output)
    }
}

/// Discover the session's tools and register one executor per tool
///
/// # Errors
///
/// Returns error if `tools/list` fails.
pub async fn load_mcp_tools(session: &McpSession) -> Result<ToolRegistry> {
    let tools = session.list_tools().await?;
    let protocol = session.protocol();

    let mut registry = ToolRegistry::new();
    for tool in tools {
        let executor = McpToolExecutor::new(Arc::clone(&protocol), tool);
        registry.register(executor.name().to_string(), Arc::new(executor));
    }

    tracing::info!(
        server = %session.label(),
        count = registry.len(),
        "registered MCP tools"
    );
    Ok(registry)
}
