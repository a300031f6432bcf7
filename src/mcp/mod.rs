//! MCP (Model Context Protocol) client support for tw-client
//!
//! This module connects to a remote MCP server over the streamable HTTP
//! transport and exposes the tool methods the agent needs.
//!
//! The implementation targets protocol revision **2025-11-25** and accepts
//! **2025-06-18** and **2025-03-26** from older servers.
//!
//! # Module Layout
//!
//! - `types`     -- MCP protocol types and JSON-RPC primitives
//! - `client`    -- Transport-agnostic async JSON-RPC 2.0 client
//! - `protocol`  -- Typed MCP lifecycle wrapper over `JsonRpcClient`
//! - `transport` -- `Transport` trait, streamable HTTP implementation and an
//!   in-memory fake for tests
//! - `session`   -- Scoped session: open, use, release exactly once

pub mod client;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

pub use session::McpSession;
