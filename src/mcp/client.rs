//! Transport-agnostic async JSON-RPC 2.0 client
//!
//! [`JsonRpcClient`] writes serialized requests to an outbound channel and
//! correlates responses arriving on an inbound channel by request id. The
//! transport that moves strings between those channels and the server lives
//! elsewhere (see [`crate::mcp::session`]).
//!
//! # Design
//!
//! - In-flight requests are tracked in a `pending` map keyed by `u64` id.
//!   Each entry is a `oneshot::Sender` resolved with the `result`, the
//!   server's `error`, or a transport failure reported via
//!   [`JsonRpcClient::fail_pending`].
//! - A [`CancellationToken`] stops the read loop and drops every pending
//!   sender so awaiting callers receive an error instead of hanging.
//! - Server-initiated `ping` requests are answered with an empty result;
//!   any other server request gets `-32601 Method not found`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};
use crate::mcp::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_PING};

/// Default timeout applied to every request when the caller does not specify one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type PendingMap =
    HashMap<u64, oneshot::Sender<std::result::Result<serde_json::Value, ClientError>>>;

/// Transport-agnostic async JSON-RPC 2.0 client.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use tw_mcp_client::mcp::client::{start_read_loop, JsonRpcClient};
///
/// #[tokio::main]
/// async fn main() {
///     let (out_tx, _out_rx) = mpsc::unbounded_channel::<String>();
///     let (_in_tx, in_rx) = mpsc::unbounded_channel::<String>();
///     let client = Arc::new(JsonRpcClient::new("Teamwork.com", out_tx));
///     let _handle = start_read_loop(in_rx, CancellationToken::new(), Arc::clone(&client));
/// }
/// ```
pub struct JsonRpcClient {
    server: String,
    next_id: Arc<AtomicU64>,
    pending: Arc<Mutex<PendingMap>>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("server", &self.server)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a new client for the server labelled `server`.
    ///
    /// The label only appears in errors and logs.
    pub fn new(server: impl Into<String>, outbound_tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            server: server.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound_tx,
        }
    }

    /// Create a client that shares the id counter and pending map with
    /// `self`, so a read loop started on one resolves requests issued by
    /// the other.
    pub fn clone_shared(&self) -> Self {
        Self {
            server: self.server.clone(),
            next_id: Arc::clone(&self.next_id),
            pending: Arc::clone(&self.pending),
            outbound_tx: self.outbound_tx.clone(),
        }
    }

    /// Label of the server this client talks to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Send a JSON-RPC request and await the typed response.
    ///
    /// # Arguments
    ///
    /// * `method` - The JSON-RPC method name.
    /// * `params` - Parameters to serialize into the `params` field.
    /// * `timeout` - Optional timeout; defaults to [`DEFAULT_REQUEST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::McpTransport`] if the outbound channel is closed
    /// or the transport failed to deliver the request, [`ClientError::McpAuth`]
    /// if the server rejected the credentials, [`ClientError::McpTimeout`] if
    /// no response arrives in time and [`ClientError::Mcp`] if the server
    /// returned a JSON-RPC error.
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register before sending so a fast response always finds its slot.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        })?;

        tracing::debug!(server = %self.server, id, method, "sending MCP request");

        if self.outbound_tx.send(message).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::McpTransport("outbound channel closed".to_string()).into());
        }

        let deadline = timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let outcome = match tokio::time::timeout(deadline, rx).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ClientError::McpTimeout {
                    server: self.server.clone(),
                    method: method.to_string(),
                }
                .into());
            }
        };

        let value = outcome.map_err(|_| {
            ClientError::McpTransport("read loop exited before response arrived".to_string())
        })??;

        serde_json::from_value(value).map_err(|e| ClientError::Serialization(e).into())
    }

    /// Send a JSON-RPC notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::McpTransport`] if the outbound channel is closed.
    pub fn notify<P: serde::Serialize + Send>(&self, method: &str, params: P) -> Result<()> {
        let message = serde_json::to_string(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": serde_json::to_value(params)?
        }))?;

        self.outbound_tx
            .send(message)
            .map_err(|_| ClientError::McpTransport("outbound channel closed".to_string()))?;

        Ok(())
    }

    /// Resolve the pending request `id` with `error`.
    ///
    /// Used by the transport pump when a request could not be delivered, so
    /// the caller fails immediately rather than waiting for the timeout.
    /// Returns `false` when no request with that id is waiting.
    pub async fn fail_pending(&self, id: u64, error: ClientError) -> bool {
        let tx = self.pending.lock().await.remove(&id);
        match tx {
            Some(tx) => {
                let _ = tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Number of requests still waiting for a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Extract the numeric request id from a serialized outbound message.
///
/// Returns `None` for notifications and for anything that is not JSON.
pub fn outbound_request_id(raw: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("method")?;
    value.get("id")?.as_u64()
}

/// Start the JSON-RPC read loop as a background Tokio task.
///
/// Responses resolve their pending sender; server requests are answered on
/// the outbound channel; notifications are logged and dropped. The loop
/// exits when `cancellation` fires or the inbound channel closes, clearing
/// every pending sender on the way out.
pub fn start_read_loop(
    mut inbound_rx: mpsc::UnboundedReceiver<String>,
    cancellation: CancellationToken,
    client: Arc<JsonRpcClient>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = inbound_rx.recv() => match maybe_msg {
                    Some(raw) => dispatch_message(&raw, &client).await,
                    None => break,
                },
            }
        }
        client.pending.lock().await.clear();
    })
}

async fn dispatch_message(raw: &str, client: &JsonRpcClient) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("MCP read loop: failed to parse inbound JSON: {e}");
            return;
        }
    };

    let has_id = value.get("id").is_some_and(|id| !id.is_null());
    let method = value.get("method").and_then(|m| m.as_str());
    let is_response = value.get("result").is_some() || value.get("error").is_some();

    match (has_id, method) {
        (true, None) if is_response => handle_response(value, client).await,
        (true, Some(method)) => handle_server_request(method, &value, client),
        (false, Some(method)) => {
            tracing::debug!(server = %client.server, method, "ignoring MCP notification");
        }
        _ => tracing::debug!("MCP read loop: received unclassifiable message; ignoring"),
    }
}

async fn handle_response(value: serde_json::Value, client: &JsonRpcClient) {
    let id_val = &value["id"];
    let Some(id) = id_val
        .as_u64()
        .or_else(|| id_val.as_str().and_then(|s| s.parse().ok()))
    else {
        tracing::warn!("MCP read loop: response has non-integer id: {id_val}");
        return;
    };

    let Some(tx) = client.pending.lock().await.remove(&id) else {
        tracing::debug!("MCP read loop: received response for unknown id {id}; ignoring");
        return;
    };

    let outcome = match value.get("error") {
        Some(error_val) => {
            let message = serde_json::from_value::<JsonRpcError>(error_val.clone())
                .map(|e| e.to_string())
                .unwrap_or_else(|_| format!("malformed error object: {error_val}"));
            Err(ClientError::Mcp(message))
        }
        None => Ok(value
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null)),
    };

    // The caller may already have timed out.
    let _ = tx.send(outcome);
}

fn handle_server_request(method: &str, value: &serde_json::Value, client: &JsonRpcClient) {
    let id = value.get("id").cloned();
    let response = if method == METHOD_PING {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(serde_json::json!({})),
            error: None,
        }
    } else {
        tracing::debug!(server = %client.server, method, "rejecting unsupported server request");
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {method}"),
                data: None,
            }),
        }
    };

    if let Ok(serialized) = serde_json::to_string(&response) {
        let _ = client.outbound_tx.send(serialized);
    }
}
