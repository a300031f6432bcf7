//! Shared fixtures for integration tests
//!
//! [`McpResponder`] answers JSON-RPC requests the way a streamable HTTP MCP
//! server does: requests get a JSON body with the echoed id, notifications
//! get `202 Accepted`.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[allow(dead_code)]
pub const SESSION_ID: &str = "tw-test-session";

/// Stateless MCP server stand-in.
pub struct McpResponder {
    tools: Value,
}

impl McpResponder {
    pub fn new(tools: Value) -> Self {
        Self { tools }
    }

    fn result_for(&self, method: &str, params: &Value) -> Result<Value, (i64, String)> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": "2025-11-25",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "tw-mcp-test", "version": "0.0.1" }
            })),
            "tools/list" => Ok(json!({ "tools": self.tools })),
            "tools/call" => Ok(json!({
                "content": [{
                    "type": "text",
                    "text": format!("called {}", params["name"].as_str().unwrap_or("?"))
                }]
            })),
            "ping" => Ok(json!({})),
            other => Err((-32601, format!("Method not found: {other}"))),
        }
    }
}

impl Respond for McpResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };

        let id = match body.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => return ResponseTemplate::new(202),
        };

        let method = body["method"].as_str().unwrap_or_default();
        let reply = match self.result_for(method, &body["params"]) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message }
            }),
        };

        ResponseTemplate::new(200)
            .set_body_raw(reply.to_string().into_bytes(), "application/json")
            .insert_header("MCP-Session-Id", SESSION_ID)
    }
}

/// Two tools shaped like the Teamwork.com catalog.
#[allow(dead_code)]
pub fn sample_tools() -> Value {
    json!([
        {
            "name": "twprojects-list_projects",
            "description": "List projects",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "twprojects-create_task",
            "title": "Create task",
            "inputSchema": {
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }
        }
    ])
}

/// Start a mock MCP server that answers POSTs and accepts exactly
/// `expected_deletes` session terminations.
#[allow(dead_code)]
pub async fn start_mcp_server(tools: Value, expected_deletes: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(McpResponder::new(tools))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_deletes)
        .mount(&server)
        .await;

    server
}

/// Endpoint URL of a server started with [`start_mcp_server`].
#[allow(dead_code)]
pub fn mcp_url(server: &MockServer) -> String {
    format!("{}/mcp", server.uri())
}

/// Mount an Ollama `/api/chat` endpoint that always answers with `reply`.
#[allow(dead_code)]
pub async fn mount_ollama_reply(server: &MockServer, reply: &str) {
    mount_slow_ollama_reply(server, reply, Duration::ZERO).await;
}

/// Like [`mount_ollama_reply`], holding each answer back for `delay`.
#[allow(dead_code)]
pub async fn mount_slow_ollama_reply(server: &MockServer, reply: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "model": "llama3.2",
                    "message": { "role": "assistant", "content": reply },
                    "done": true,
                    "prompt_eval_count": 12,
                    "eval_count": 4
                }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Poll the mock server until a request for `request_path` has arrived.
#[allow(dead_code)]
pub async fn wait_for_request(server: &MockServer, request_path: &str) {
    for _ in 0..100 {
        let seen = server.received_requests().await.unwrap_or_default();
        if seen.iter().any(|r| r.url.path() == request_path) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("no request to {request_path} within 10s");
}
