//! tw-client - chat with an LLM agent backed by Teamwork.com MCP tools
//!
//! This library provides the pieces the `tw-client` binary wires together:
//! a streamable-HTTP MCP client, a bridge exposing MCP tools to an agent,
//! model providers, and the interactive session runner.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `cli`: Command-line interface definition
//! - `config`: One-shot configuration resolution from flags and environment
//! - `error`: Error types and result aliases
//! - `mcp`: MCP session over streamable HTTP
//! - `tools`: Tool registry and the MCP tool bridge
//! - `providers`: Model provider abstraction and implementations (OpenAI, Ollama)
//! - `agent`: The tool-calling agent loop
//! - `commands`: The interactive session runner
//!
//! # Example
//!
//! ```no_run
//! use tw_mcp_client::cli::Cli;
//! use tw_mcp_client::commands::chat;
//! use tw_mcp_client::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse_args();
//!     let config = Config::from_cli(&cli)?;
//!     chat::run_chat(config).await
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod mcp;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use agent::Agent;
pub use config::Config;
pub use error::{ClientError, Result};
