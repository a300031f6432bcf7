//! Typed MCP lifecycle wrapper over [`JsonRpcClient`]
//!
//! - [`McpProtocol`] -- an uninitialized client. [`McpProtocol::initialize`]
//!   performs the `initialize` / `notifications/initialized` handshake and
//!   returns an [`InitializedMcpProtocol`].
//! - [`InitializedMcpProtocol`] -- a negotiated session exposing the tool
//!   methods this client needs. `list_tools` follows `nextCursor` until the
//!   server stops returning one.
//!
//! Neither type owns a transport; [`crate::mcp::session::McpSession`] wires
//! the channels.

use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::mcp::client::JsonRpcClient;
use crate::mcp::types::{
    CallToolParams, CallToolResponse, ClientCapabilities, Implementation, InitializeParams,
    InitializeResponse, ListToolsResponse, McpTool, PaginatedParams, LATEST_PROTOCOL_VERSION,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    SUPPORTED_PROTOCOL_VERSIONS,
};

/// Upper bound on `tools/list` pages, guarding against a server that keeps
/// returning the same cursor.
const MAX_TOOL_PAGES: usize = 100;

/// An MCP client that has not completed the handshake yet.
#[derive(Debug)]
pub struct McpProtocol {
    client: JsonRpcClient,
}

impl McpProtocol {
    /// Wrap a [`JsonRpcClient`] whose read loop is already running.
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }

    /// Perform the MCP handshake.
    ///
    /// Sends `initialize` with [`LATEST_PROTOCOL_VERSION`], checks that the
    /// server picked a revision listed in [`SUPPORTED_PROTOCOL_VERSIONS`] and
    /// then sends `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::McpProtocolVersion`] when the server selects an
    /// unsupported revision, or whatever the request itself failed with
    /// (auth, transport, timeout).
    pub async fn initialize(
        self,
        client_info: Implementation,
        capabilities: ClientCapabilities,
    ) -> Result<InitializedMcpProtocol> {
        let response: InitializeResponse = self
            .client
            .request(
                METHOD_INITIALIZE,
                InitializeParams {
                    protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                    capabilities,
                    client_info,
                },
                None,
            )
            .await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&response.protocol_version.as_str()) {
            return Err(ClientError::McpProtocolVersion {
                expected: SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                got: response.protocol_version,
            }
            .into());
        }

        tracing::info!(
            server = %self.client.server(),
            server_name = %response.server_info.name,
            server_version = %response.server_info.version,
            protocol_version = %response.protocol_version,
            "MCP session initialized"
        );

        self.client
            .notify(METHOD_INITIALIZED, serde_json::json!({}))?;

        Ok(InitializedMcpProtocol {
            client: self.client,
            initialize_response: response,
        })
    }
}

/// A fully negotiated MCP session.
#[derive(Debug)]
pub struct InitializedMcpProtocol {
    client: JsonRpcClient,
    initialize_response: InitializeResponse,
}

impl InitializedMcpProtocol {
    /// The server's `initialize` response.
    pub fn initialize_response(&self) -> &InitializeResponse {
        &self.initialize_response
    }

    /// Protocol revision agreed with the server.
    pub fn protocol_version(&self) -> &str {
        &self.initialize_response.protocol_version
    }

    /// Label of the server this session talks to.
    pub fn server(&self) -> &str {
        self.client.server()
    }

    /// List every tool the server exposes, following pagination cursors.
    ///
    /// # Errors
    ///
    /// Returns the first request failure; partial pages are discarded.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=MAX_TOOL_PAGES {
            let resp: ListToolsResponse = self
                .client
                .request(METHOD_TOOLS_LIST, PaginatedParams { cursor }, None)
                .await?;

            tracing::debug!(page, count = resp.tools.len(), "received tools/list page");
            tools.extend(resp.tools);

            match resp.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => return Ok(tools),
            }
        }

        Err(ClientError::Mcp(format!(
            "tools/list did not finish after {MAX_TOOL_PAGES} pages"
        ))
        .into())
    }

    /// Invoke a tool by name.
    ///
    /// # Arguments
    ///
    /// * `name` - Tool name as returned by `tools/list`.
    /// * `arguments` - JSON object matching the tool's input schema.
    /// * `timeout` - Optional override of the default request timeout.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<CallToolResponse> {
        self.client
            .request(
                METHOD_TOOLS_CALL,
                CallToolParams {
                    name: name.to_string(),
                    arguments,
                },
                timeout,
            )
            .await
    }

    /// Send a keepalive `ping`.
    pub async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .request(METHOD_PING, serde_json::json!({}), None)
            .await?;
        Ok(())
    }
}
