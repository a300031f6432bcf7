//! Scoped MCP session
//!
//! [`McpSession`] owns everything needed to talk to one configured server
//! entry: the transport, the JSON-RPC client, the background pump tasks and
//! the negotiated [`InitializedMcpProtocol`]. It is opened once at startup
//! and released exactly once with [`McpSession::close`].
//!
//! Three background tasks run while the session is open:
//!
//! - the writer drains the client's outbound channel into
//!   [`Transport::send`], failing the matching pending request when delivery
//!   fails;
//! - the reader forwards [`Transport::receive`] into the client's inbound
//!   channel;
//! - the JSON-RPC read loop correlates responses.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{SessionConfig, TransportKind};
use crate::error::{ClientError, Result};
use crate::mcp::client::{outbound_request_id, start_read_loop, JsonRpcClient};
use crate::mcp::protocol::{InitializedMcpProtocol, McpProtocol};
use crate::mcp::transport::http::HttpTransport;
use crate::mcp::transport::Transport;
use crate::mcp::types::{ClientCapabilities, Implementation, McpTool};

/// Name this client reports in `initialize`.
pub const CLIENT_NAME: &str = "tw-client";

/// An open, initialized session with one MCP server.
#[derive(Debug)]
pub struct McpSession {
    label: String,
    protocol: Arc<InitializedMcpProtocol>,
    transport: Arc<dyn Transport>,
    cancellation: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    released: bool,
}

impl McpSession {
    /// Open a session for the configured server entry.
    ///
    /// # Errors
    ///
    /// Any transport, authentication or handshake failure. Nothing needs
    /// releasing when this returns an error.
    pub async fn open(config: &SessionConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = match config.transport {
            TransportKind::StreamableHttp => Arc::new(HttpTransport::new(
                config.server_url.clone(),
                // Empty token: no Authorization header rather than `Bearer `.
                config.auth_headers(),
                config.request_timeout,
            )?),
        };

        tracing::info!(
            server = %config.label,
            url = %config.server_url,
            transport = %config.transport,
            "opening MCP session"
        );

        Self::connect(&config.label, transport).await
    }

    /// Run the handshake over an already constructed transport.
    pub async fn connect(label: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        let cancellation = CancellationToken::new();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        let shared = Arc::new(JsonRpcClient::new(label, out_tx));
        let tasks = vec![
            start_read_loop(in_rx, cancellation.clone(), Arc::clone(&shared)),
            spawn_writer(
                out_rx,
                Arc::clone(&transport),
                Arc::clone(&shared),
                cancellation.clone(),
            ),
            spawn_reader(Arc::clone(&transport), in_tx, cancellation.clone()),
        ];

        let client_info = Implementation {
            name: CLIENT_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
        };

        let protocol = match McpProtocol::new(shared.clone_shared())
            .initialize(client_info, ClientCapabilities::default())
            .await
        {
            Ok(protocol) => protocol,
            Err(e) => {
                cancellation.cancel();
                if let Err(close_err) = transport.close().await {
                    tracing::debug!("closing half-open MCP session failed: {close_err}");
                }
                for task in &tasks {
                    task.abort();
                }
                return Err(e);
            }
        };

        transport
            .set_protocol_version(protocol.protocol_version())
            .await;

        Ok(Self {
            label: label.to_string(),
            protocol: Arc::new(protocol),
            transport,
            cancellation,
            tasks,
            released: false,
        })
    }

    /// Label of the configured server entry.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shared handle to the negotiated protocol, used by tool executors.
    pub fn protocol(&self) -> Arc<InitializedMcpProtocol> {
        Arc::clone(&self.protocol)
    }

    /// Discover every tool the server exposes.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        self.protocol.list_tools().await
    }

    /// Release the session.
    ///
    /// Stops the background tasks and asks the transport to terminate the
    /// remote session. Consumes the handle, so a session is closed at most
    /// once; the `Drop` impl does nothing afterwards.
    pub async fn close(mut self) -> Result<()> {
        self.released = true;
        self.cancellation.cancel();
        let result = self.transport.close().await;
        for task in self.tasks.drain(..) {
            task.abort();
            // Join so the outbound channel is gone before we return.
            let _ = task.await;
        }
        match &result {
            Ok(()) => tracing::info!(server = %self.label, "MCP session closed"),
            Err(e) => tracing::warn!(server = %self.label, "MCP session close failed: {e}"),
        }
        result
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::warn!(server = %self.label, "MCP session dropped without close");
        self.cancellation.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_writer(
    mut out_rx: mpsc::UnboundedReceiver<String>,
    transport: Arc<dyn Transport>,
    client: Arc<JsonRpcClient>,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = out_rx.recv() => {
                    let Some(message) = maybe_msg else { break };
                    let request_id = outbound_request_id(&message);
                    if let Err(e) = transport.send(message).await {
                        let error = e
                            .downcast::<ClientError>()
                            .unwrap_or_else(|e| ClientError::McpTransport(e.to_string()));
                        match request_id {
                            Some(id) => {
                                client.fail_pending(id, error).await;
                            }
                            None => tracing::warn!("failed to deliver MCP message: {error}"),
                        }
                    }
                }
            }
        }
    })
}

fn spawn_reader(
    transport: Arc<dyn Transport>,
    in_tx: mpsc::UnboundedSender<String>,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut inbound = transport.receive();
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = inbound.next() => match maybe_msg {
                    Some(message) => {
                        if in_tx.send(message).is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    })
}
