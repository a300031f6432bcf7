//! Error types for tw-client
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for tw-client operations
///
/// This enum covers configuration resolution, the MCP session and its
/// transport, model provider calls, tool execution and the console loop.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, authentication, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Generic MCP protocol error (JSON-RPC error object, bad response shape)
    #[error("MCP error: {0}")]
    Mcp(String),

    /// MCP transport failure (connection refused, unexpected HTTP status)
    #[error("MCP transport error: {0}")]
    McpTransport(String),

    /// The MCP server rejected the supplied credentials
    #[error("MCP authentication error: {0}")]
    McpAuth(String),

    /// An MCP request did not receive a response in time
    #[error("MCP request timed out: server={server}, method={method}")]
    McpTimeout {
        /// Label of the server the request was sent to
        server: String,
        /// JSON-RPC method name
        method: String,
    },

    /// The server negotiated a protocol revision this client does not speak
    #[error("MCP protocol version mismatch: expected one of {expected:?}, got {got}")]
    McpProtocolVersion {
        /// Revisions the client supports
        expected: Vec<String>,
        /// Revision returned by the server
        got: String,
    },

    /// The server no longer recognizes the session id
    #[error("MCP session expired: {0}")]
    McpSessionExpired(String),

    /// Agent exceeded maximum iteration limit
    #[error("Agent exceeded maximum iterations: limit={limit}, {message}")]
    MaxIterationsExceeded {
        /// The configured iteration limit
        limit: usize,
        /// Additional context about the failure
        message: String,
    },

    /// Agent turn exceeded its wall-clock budget
    #[error("Agent turn timed out after {0} seconds")]
    Timeout(u64),


    /// Console line editor errors
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for tw-client operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ClientError::Config("invalid server URL".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid server URL");
    }

    #[test]
    fn test_provider_error_display() {
        let error = ClientError::Provider("API timeout".to_string());
        assert_eq!(error.to_string(), "Provider error: API timeout");
    }

    #[test]
    fn test_mcp_timeout_display() {
        let error = ClientError::McpTimeout {
            server: "Teamwork.com".to_string(),
            method: "tools/list".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "MCP request timed out: server=Teamwork.com, method=tools/list"
        );
    }

    #[test]
    fn test_mcp_protocol_version_display() {
        let error = ClientError::McpProtocolVersion {
            expected: vec!["2025-11-25".to_string()],
            got: "1999-01-01".to_string(),
        };
        let text = error.to_string();
        assert!(text.contains("2025-11-25"));
        assert!(text.contains("1999-01-01"));
    }

    #[test]
    fn test_max_iterations_error_display() {
        let error = ClientError::MaxIterationsExceeded {
            limit: 25,
            message: "stuck in loop".to_string(),
        };
        assert!(error.to_string().contains("limit=25"));
        assert!(error.to_string().contains("stuck in loop"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error: ClientError = io.into();
        assert!(error.to_string().starts_with("IO error:"));
    }

    #[test]
    fn test_error_downcasts_through_anyhow() {
        let err: anyhow::Error = ClientError::McpAuth("HTTP 401".to_string()).into();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::McpAuth(_))
        ));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientError>();
    }
}
