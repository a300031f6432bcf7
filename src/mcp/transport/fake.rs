//! In-process fake transport for MCP unit tests
//!
//! [`FakeTransport::new`] returns a `(FakeTransport, FakeTransportHandle)`
//! pair. Wire the transport into the code under test and use the handle to:
//!
//! - Read what the client sent: `handle.outbound_rx.recv().await`
//! - Inject server responses: `handle.inbound_tx.send(json_string)`
//! - Count how often the session was released: `handle.close_count()`
//!
//! ```text
//! client send() -----> outbound_tx -----> outbound_rx (handle reads)
//! handle inbound_tx -> inbound_tx  -----> inbound_rx  (client receive())
//! ```

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::error::{ClientError, Result};
use crate::mcp::transport::Transport;

/// In-process fake transport for use in tests.
#[derive(Debug)]
pub struct FakeTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    close_calls: Arc<AtomicUsize>,
    reject_sends: Arc<AtomicBool>,
}

/// Test-side handle paired with a [`FakeTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Messages the client sent.
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Push serialized server messages for the client to receive.
    pub inbound_tx: mpsc::UnboundedSender<String>,
    close_calls: Arc<AtomicUsize>,
    reject_sends: Arc<AtomicBool>,
}

impl FakeTransport {
    /// Create a new `(FakeTransport, FakeTransportHandle)` pair.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let close_calls = Arc::new(AtomicUsize::new(0));
        let reject_sends = Arc::new(AtomicBool::new(false));

        let transport = Self {
            outbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            close_calls: Arc::clone(&close_calls),
            reject_sends: Arc::clone(&reject_sends),
        };

        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
            close_calls,
            reject_sends,
        };

        (transport, handle)
    }
}

impl FakeTransportHandle {
    /// Number of times [`Transport::close`] was called.
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent `send` fail with an auth error.
    pub fn reject_sends(&self) {
        self.reject_sends.store(true, Ordering::SeqCst);
    }

    /// Wait for the next outbound message and parse it as JSON.
    pub async fn next_sent(&mut self) -> serde_json::Value {
        let raw = self
            .outbound_rx
            .recv()
            .await
            .expect("fake transport outbound channel closed");
        serde_json::from_str(&raw).expect("client sent invalid JSON")
    }

    /// Answer request `id` with `result`.
    pub fn respond(&self, id: &serde_json::Value, result: serde_json::Value) {
        let msg = serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result });
        self.inbound_tx
            .send(msg.to_string())
            .expect("fake transport inbound channel closed");
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(ClientError::McpAuth("HTTP 401 Unauthorized".to_string()).into());
        }
        self.outbound_tx
            .send(message)
            .map_err(|_| ClientError::McpTransport("fake outbound channel closed".to_string()))?;
        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.inbound_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_send_reaches_handle() {
        let (transport, mut handle) = FakeTransport::new();
        transport
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string())
            .await
            .unwrap();
        let sent = handle.next_sent().await;
        assert_eq!(sent["method"], "ping");
    }

    #[tokio::test]
    async fn test_injected_message_is_received() {
        let (transport, handle) = FakeTransport::new();
        handle.respond(&serde_json::json!(1), serde_json::json!({}));
        let received = transport.receive().next().await.unwrap();
        assert!(received.contains("\"result\""));
    }

    #[tokio::test]
    async fn test_rejected_send_is_auth_error() {
        let (transport, handle) = FakeTransport::new();
        handle.reject_sends();
        let err = transport.send("{}".to_string()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::McpAuth(_))
        ));
    }

    #[tokio::test]
    async fn test_close_is_counted() {
        let (transport, handle) = FakeTransport::new();
        transport.close().await.unwrap();
        assert_eq!(handle.close_count(), 1);
    }
}
