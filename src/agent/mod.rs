//! Agent module for tw-client
//!
//! This module contains the per-turn conversation state and the agent loop
//! that alternates between model completions and tool execution.

pub mod conversation;
pub mod core;

pub use conversation::Conversation;
pub use core::Agent;
