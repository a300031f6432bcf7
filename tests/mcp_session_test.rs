//! MCP session lifecycle tests
//!
//! Opens real `McpSession`s against a wiremock MCP server: handshake, tool
//! discovery, a tool call through the bridge, and release.

mod common;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tw_mcp_client::config::{SessionConfig, TransportKind, SERVER_LABEL};
use tw_mcp_client::error::ClientError;
use tw_mcp_client::mcp::McpSession;
use tw_mcp_client::tools::{load_mcp_tools, ToolExecutor};

use common::{mcp_url, sample_tools, start_mcp_server};

fn session_config(url: &str, token: &str) -> SessionConfig {
    SessionConfig {
        label: SERVER_LABEL.to_string(),
        server_url: url.parse().expect("valid url"),
        bearer_token: token.to_string(),
        transport: TransportKind::StreamableHttp,
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_open_list_and_close() {
    let server = start_mcp_server(sample_tools(), 1).await;

    let session = McpSession::open(&session_config(&mcp_url(&server), ""))
        .await
        .expect("session opens");
    assert_eq!(session.label(), "Teamwork.com");
    assert_eq!(session.protocol().protocol_version(), "2025-11-25");

    let tools = session.list_tools().await.expect("tools/list");
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["twprojects-list_projects", "twprojects-create_task"]
    );

    session.close().await.expect("close");
    server.verify().await;
}

#[tokio::test]
async fn test_loaded_tools_call_through_session() {
    let server = start_mcp_server(sample_tools(), 1).await;
    let session = McpSession::open(&session_config(&mcp_url(&server), ""))
        .await
        .expect("session opens");

    let registry = load_mcp_tools(&session).await.expect("tools load");
    assert_eq!(registry.len(), 2);

    let definitions = registry.all_definitions();
    let create = definitions
        .iter()
        .find(|d| d["name"] == "twprojects-create_task")
        .expect("create_task definition");
    assert_eq!(create["description"], "Create task");
    assert_eq!(create["parameters"]["required"], json!(["name"]));

    let executor = registry
        .get("twprojects-list_projects")
        .expect("list_projects registered");
    let result = executor.execute(json!({})).await.expect("tool runs");
    assert!(result.success);
    assert!(result.output.contains("called twprojects-list_projects"));

    drop(executor);
    drop(registry);
    session.close().await.expect("close");
    server.verify().await;
}

#[tokio::test]
async fn test_bearer_token_sent_on_handshake() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer tw-secret"))
        .respond_with(common::McpResponder::new(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let session = McpSession::open(&session_config(&server.uri(), "tw-secret"))
        .await
        .expect("authorized session opens");
    assert!(session.list_tools().await.expect("tools/list").is_empty());
    tokio_test::assert_ok!(session.close().await);
}

#[tokio::test]
async fn test_rejected_credentials_fail_open() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = McpSession::open(&session_config(&server.uri(), "wrong"))
        .await
        .expect_err("401 must fail the handshake");

    assert!(
        matches!(err.downcast_ref::<ClientError>(), Some(ClientError::McpAuth(_))),
        "got: {err:#}"
    );
}

#[tokio::test]
async fn test_empty_token_sends_no_authorization_header() {
    let server = start_mcp_server(sample_tools(), 1).await;

    let session = McpSession::open(&session_config(&mcp_url(&server), ""))
        .await
        .expect("session opens without credentials");
    session.close().await.expect("close");

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(!requests.is_empty());
    for request in &requests {
        assert!(
            !request
                .headers
                .iter()
                .any(|(name, _)| name.as_str().eq_ignore_ascii_case("authorization")),
            "{} {} carried an Authorization header",
            request.method,
            request.url
        );
    }
    server.verify().await;
}
