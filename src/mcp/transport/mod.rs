//! MCP transport abstraction and implementations
//!
//! - [`http::HttpTransport`] -- Streamable HTTP/SSE transport, the only
//!   transport the session runner uses.
//! - [`fake::FakeTransport`] -- in-process fake used in tests (cfg(test)
//!   only).
//!
//! Callers `send` a serialized JSON-RPC string and `receive` a stream of
//! serialized JSON-RPC strings (one per logical message). Framing and
//! session bookkeeping belong to each concrete implementation.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

/// Abstraction over MCP transport implementations.
///
/// Used polymorphically through `Arc<dyn Transport>` by
/// [`crate::mcp::session::McpSession`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a complete JSON-RPC message string to the remote peer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ClientError::McpTransport`] if delivery fails,
    /// or [`crate::error::ClientError::McpAuth`] if the peer rejected the
    /// credentials.
    async fn send(&self, message: String) -> Result<()>;

    /// Returns a stream of inbound JSON-RPC message strings.
    ///
    /// The stream ends when the transport is closed.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Release the remote session, if any.
    ///
    /// Calling `close` more than once is a no-op after the first call.
    async fn close(&self) -> Result<()>;

    /// Record the protocol revision agreed during `initialize`.
    async fn set_protocol_version(&self, _version: &str) {}
}

pub mod http;

#[cfg(test)]
pub mod fake;
