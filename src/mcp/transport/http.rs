//! Streamable HTTP/SSE transport for MCP
//!
//! Every outbound JSON-RPC message is sent as an HTTP POST. The server may
//! reply with:
//!
//! - `application/json` -- a direct JSON response body
//! - `text/event-stream` -- an SSE stream carrying one or more JSON-RPC
//!   messages
//! - `202 Accepted` -- an acknowledgement with no body (used for
//!   notifications)
//!
//! # Session management
//!
//! The server MAY return an `MCP-Session-Id` response header on
//! `initialize`. When present it is attached to every subsequent POST, and
//! [`Transport::close`] terminates it with an HTTP DELETE. A `404` while a
//! session is active clears the session and surfaces
//! [`ClientError::McpSessionExpired`].
//!
//! # Drop behaviour
//!
//! If the transport is dropped while a session is still active (the owner
//! never called `close`), a blocking DELETE is issued from a helper thread.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::sync::{mpsc, RwLock};

use crate::error::{ClientError, Result};
use crate::mcp::transport::Transport;
use crate::mcp::types::LATEST_PROTOCOL_VERSION;

/// Response/request header carrying the server-assigned session id.
pub const SESSION_ID_HEADER: &str = "MCP-Session-Id";

/// Request header carrying the negotiated protocol revision.
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Streamable HTTP/SSE transport.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use url::Url;
/// use tw_mcp_client::mcp::transport::http::HttpTransport;
///
/// let transport = HttpTransport::new(
///     Url::parse("https://mcp.ai.teamwork.com").unwrap(),
///     HashMap::new(),
///     Duration::from_secs(30),
/// )
/// .unwrap();
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: url::Url,
    session_id: Arc<RwLock<Option<String>>>,
    protocol_version: RwLock<String>,
    /// Static extra headers merged into every request (e.g. Authorization).
    headers: HashMap<String, String>,
    response_tx: mpsc::UnboundedSender<String>,
    response_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl HttpTransport {
    /// Construct a new [`HttpTransport`] targeting `endpoint`.
    ///
    /// No network I/O is performed at construction time.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The MCP server URL.
    /// * `headers` - Extra headers added to every request. Auth tokens go here.
    /// * `timeout` - Per-request HTTP timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::McpTransport`] if the HTTP client cannot be
    /// built (TLS backend initialisation failure).
    pub fn new(
        endpoint: url::Url,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::McpTransport(format!("failed to build HTTP client: {e}")))?;

        let (response_tx, response_rx) = mpsc::unbounded_channel();

        Ok(Self {
            http_client,
            endpoint,
            session_id: Arc::new(RwLock::new(None)),
            protocol_version: RwLock::new(LATEST_PROTOCOL_VERSION.to_string()),
            headers,
            response_tx,
            response_rx: Arc::new(tokio::sync::Mutex::new(response_rx)),
        })
    }

    /// The session id assigned by the server, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    fn log_request(&self, method: &str, session_id: Option<&str>) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let headers: Vec<String> = self
            .headers
            .iter()
            .map(|(k, v)| format!("{k}: {}", redact_header(k, v)))
            .collect();
        tracing::debug!(
            method,
            endpoint = %self.endpoint,
            session_id = session_id.unwrap_or("-"),
            headers = ?headers,
            "MCP HTTP request"
        );
    }
}

/// Mask credentials before a header value reaches the logs.
///
/// # Examples
///
/// ```
/// use tw_mcp_client::mcp::transport::http::redact_header;
///
/// assert_eq!(redact_header("Authorization", "Bearer abc"), "Bearer REDACTED");
/// assert_eq!(redact_header("X-Trace", "42"), "42");
/// ```
pub fn redact_header(name: &str, value: &str) -> String {
    if !name.eq_ignore_ascii_case("authorization") {
        return value.to_string();
    }
    match value.split_once(' ') {
        Some((scheme, _)) => format!("{scheme} REDACTED"),
        None => "REDACTED".to_string(),
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    /// Send a JSON-RPC message via HTTP POST to the MCP endpoint.
    ///
    /// Response handling:
    ///
    /// - `text/event-stream`: SSE parsing task spawned; events pushed to
    ///   `receive()`.
    /// - `application/json`: body read and pushed to `receive()`.
    /// - `202 Accepted`: no-op (notification ACK).
    /// - `401`/`403`: [`ClientError::McpAuth`].
    /// - `404` with an active session: [`ClientError::McpSessionExpired`].
    async fn send(&self, message: String) -> Result<()> {
        let session_id = self.session_id.read().await.clone();
        let protocol_version = self.protocol_version.read().await.clone();

        self.log_request("POST", session_id.as_deref());

        let mut req = self
            .http_client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header(PROTOCOL_VERSION_HEADER, protocol_version)
            .body(message);

        if let Some(ref id) = session_id {
            req = req.header(SESSION_ID_HEADER, id.as_str());
        }
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClientError::McpTransport(format!("HTTP POST failed: {e}")))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let www_auth = response
                .headers()
                .get("WWW-Authenticate")
                .and_then(|v| v.to_str().ok())
                .map(|v| format!(" ({v})"))
                .unwrap_or_default();
            return Err(ClientError::McpAuth(format!("HTTP {status}{www_auth}")).into());
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            if self.session_id.write().await.take().is_some() {
                return Err(ClientError::McpSessionExpired(self.endpoint.to_string()).into());
            }
            return Err(ClientError::McpTransport(format!("HTTP {status}")).into());
        }

        if status == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::McpTransport(format!(
                "HTTP POST returned status {status}: {body}"
            ))
            .into());
        }

        if let Some(new_session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut sid = self.session_id.write().await;
            if sid.is_none() {
                tracing::debug!(session_id = new_session_id, "MCP session established");
                *sid = Some(new_session_id.to_string());
            }
        }

        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            let byte_stream = response.bytes_stream();
            let response_tx = self.response_tx.clone();
            tokio::spawn(async move {
                parse_sse_stream(byte_stream, response_tx).await;
            });
        } else {
            let body = response.text().await.map_err(|e| {
                ClientError::McpTransport(format!("failed to read response body: {e}"))
            })?;
            if !body.trim().is_empty() {
                let _ = self.response_tx.send(body);
            }
        }

        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.response_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }

    /// Terminate the server session with an HTTP DELETE.
    ///
    /// The session id is taken before the request goes out, so a second
    /// call (or the `Drop` fallback) never issues another DELETE. A `405`
    /// means the server does not support explicit termination and is not
    /// an error.
    async fn close(&self) -> Result<()> {
        let Some(sid) = self.session_id.write().await.take() else {
            return Ok(());
        };

        self.log_request("DELETE", Some(&sid));

        let mut req = self
            .http_client
            .delete(self.endpoint.as_str())
            .header(SESSION_ID_HEADER, sid.as_str());
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClientError::McpTransport(format!("HTTP DELETE failed: {e}")))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            tracing::debug!(%status, "MCP session terminated");
            Ok(())
        } else {
            Err(ClientError::McpTransport(format!("HTTP DELETE returned status {status}")).into())
        }
    }

    async fn set_protocol_version(&self, version: &str) {
        *self.protocol_version.write().await = version.to_string();
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        // Skip cleanup if the lock is contended; this path is best-effort.
        let session_id = match self.session_id.try_write() {
            Ok(mut guard) => guard.take(),
            Err(_) => return,
        };

        if let Some(sid) = session_id {
            tracing::debug!("MCP transport dropped with an open session; sending DELETE");
            let endpoint = self.endpoint.as_str().to_string();
            let mut extra_headers = self.headers.clone();
            extra_headers.insert(SESSION_ID_HEADER.to_string(), sid);

            // Blocking client on its own thread so the async runtime is never blocked.
            let _ = std::thread::spawn(move || {
                if let Ok(client) = reqwest::blocking::Client::builder()
                    .timeout(Duration::from_secs(5))
                    .build()
                {
                    let mut req = client.delete(&endpoint);
                    for (k, v) in &extra_headers {
                        req = req.header(k.as_str(), v.as_str());
                    }
                    let _ = req.send();
                }
            });
        }
    }
}

// ---------------------------------------------------------------------------
// SSE parser
// ---------------------------------------------------------------------------

/// Parse an SSE byte stream and forward complete `data:` events to
/// `response_tx`.
///
/// Runs until the stream ends or yields an error. `event: ping` events and
/// empty payloads are discarded. CRLF line endings are accepted. Bytes are
/// buffered until an event is complete, so a multi-byte character split
/// across network chunks is decoded intact.
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    response_tx: mpsc::UnboundedSender<String>,
) {
    use futures::StreamExt;

    let mut buffer = BytesMut::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("MCP SSE stream error: {e}");
                break;
            }
        };

        buffer.extend_from_slice(&chunk);

        while let Some((event_len, consumed)) = find_event_boundary(&buffer) {
            let block = buffer.split_to(consumed);
            forward_event_bytes(&block[..event_len], &response_tx);
        }
    }

    if !buffer.iter().all(u8::is_ascii_whitespace) {
        forward_event_bytes(&buffer, &response_tx);
    }
}

/// Locate the blank line ending the first event in `buf`.
///
/// Returns the length of the event block and the number of bytes to consume,
/// blank line included. Accepts `\n\n`, `\r\n\r\n` and mixed endings.
fn find_event_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    for (i, byte) in buf.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let mut j = i + 1;
        if buf.get(j) == Some(&b'\r') {
            j += 1;
        }
        if buf.get(j) == Some(&b'\n') {
            return Some((i, j + 1));
        }
    }
    None
}

fn forward_event_bytes(block: &[u8], response_tx: &mpsc::UnboundedSender<String>) {
    match std::str::from_utf8(block) {
        Ok(text) => process_sse_event(text, response_tx),
        Err(e) => tracing::warn!("MCP SSE event is not valid UTF-8, dropping it: {e}"),
    }
}

fn process_sse_event(event_block: &str, response_tx: &mpsc::UnboundedSender<String>) {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in event_block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // `id:`, `retry:` and `:` comments carry nothing this client uses.
    }

    if event_type.is_some_and(|et| et.eq_ignore_ascii_case("ping")) {
        return;
    }

    let data = data_lines.join("\n");
    if data.is_empty() {
        return;
    }

    let _ = response_tx.send(data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt as _;

    fn make_transport(endpoint: &str) -> HttpTransport {
        HttpTransport::new(
            url::Url::parse(endpoint).unwrap(),
            HashMap::new(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn collect_events(body: &'static [u8]) -> Vec<String> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let byte_stream = futures::stream::iter(vec![Ok(Bytes::from_static(body))]);
        parse_sse_stream(byte_stream, tx).await;
        let mut out = Vec::new();
        while let Ok(m) = rx.try_recv() {
            out.push(m);
        }
        out
    }

    #[tokio::test]
    async fn test_new_starts_with_latest_protocol_and_no_session() {
        let t = make_transport("http://localhost:9999/mcp");
        assert_eq!(*t.protocol_version.read().await, LATEST_PROTOCOL_VERSION);
        assert!(t.session_id().await.is_none());
    }

    #[tokio::test]
    async fn test_set_protocol_version_overrides_header_value() {
        let t = make_transport("http://localhost:9999/mcp");
        t.set_protocol_version("2025-03-26").await;
        assert_eq!(*t.protocol_version.read().await, "2025-03-26");
    }

    #[tokio::test]
    async fn test_receive_initially_empty() {
        let t = make_transport("http://localhost:9999/mcp");
        let mut stream = t.receive();
        let result = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(result.is_err(), "expected timeout on empty receive stream");
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let t = make_transport("http://localhost:9999/mcp");
        assert!(t.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_parse_sse_two_events_both_forwarded() {
        let events = collect_events(b"data: first\n\ndata: second\n\n").await;
        assert_eq!(events, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_parse_sse_ping_event_dropped() {
        let events = collect_events(b"event: ping\ndata: ignored\n\ndata: real\n\n").await;
        assert_eq!(events, vec!["real"]);
    }

    #[tokio::test]
    async fn test_parse_sse_crlf_and_trailing_event() {
        let events = collect_events(b"event: message\r\ndata: {\"a\":1}\r\n\r\ndata: tail").await;
        assert_eq!(events, vec![r#"{"a":1}"#, "tail"]);
    }

    #[tokio::test]
    async fn test_parse_sse_multiline_data_joined() {
        let events = collect_events(b"id: 7\ndata: line one\ndata: line two\n\n").await;
        assert_eq!(events, vec!["line one\nline two"]);
    }

    #[tokio::test]
    async fn test_parse_sse_split_across_chunks() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let chunks = vec![
            Ok(Bytes::from_static(b"data: {\"jsonrpc\":")),
            Ok(Bytes::from_static(b"\"2.0\"}\n")),
            Ok(Bytes::from_static(b"\n")),
        ];
        parse_sse_stream(futures::stream::iter(chunks), tx).await;
        assert_eq!(rx.try_recv().unwrap(), r#"{"jsonrpc":"2.0"}"#);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_parse_sse_multibyte_char_split_across_chunks() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let body = "data: {\"name\":\"Café\"}\n\n".as_bytes();
        // 0xC3 0xA9 is `é`; cut between its two bytes.
        let split = body.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let chunks = vec![
            Ok(Bytes::copy_from_slice(&body[..split])),
            Ok(Bytes::copy_from_slice(&body[split..])),
        ];
        parse_sse_stream(futures::stream::iter(chunks), tx).await;
        assert_eq!(rx.try_recv().unwrap(), r#"{"name":"Café"}"#);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_parse_sse_crlf_boundary_split_across_chunks() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let chunks = vec![
            Ok(Bytes::from_static(b"data: one\r\n\r")),
            Ok(Bytes::from_static(b"\ndata: two\r\n\r\n")),
        ];
        parse_sse_stream(futures::stream::iter(chunks), tx).await;
        assert_eq!(rx.try_recv().unwrap(), "one");
        assert_eq!(rx.try_recv().unwrap(), "two");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_find_event_boundary_variants() {
        assert_eq!(find_event_boundary(b"data: a\n\nrest"), Some((7, 9)));
        assert_eq!(find_event_boundary(b"data: a\r\n\r\n"), Some((8, 11)));
        assert_eq!(find_event_boundary(b"data: a\n"), None);
    }

    #[test]
    fn test_redact_header_masks_only_authorization() {
        assert_eq!(
            redact_header("authorization", "Bearer secret-token"),
            "Bearer REDACTED"
        );
        assert_eq!(redact_header("Authorization", "secret"), "REDACTED");
        assert_eq!(redact_header("Accept", "text/event-stream"), "text/event-stream");
    }
}
