//! Agent core implementation
//!
//! One call to [`Agent::run_turn`] is one ReAct-style turn:
//! - ask the provider for a completion with every tool definition attached
//! - execute the tool calls it requests and feed the results back
//! - repeat until the provider answers without tool calls
//!
//! The turn is bounded by `max_turns` model calls and a wall-clock timeout.

use crate::config::AgentConfig;
use crate::error::{ClientError, Result};
use crate::providers::{Message, Provider, ToolCall};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::Conversation;

/// The agent that answers one user input at a time
///
/// The agent holds no memory between turns: each [`Agent::run_turn`]
/// starts from an empty conversation.
///
/// # Examples
///
/// ```ignore
/// use tw_mcp_client::agent::Agent;
/// use tw_mcp_client::config::AgentConfig;
/// use tw_mcp_client::tools::ToolRegistry;
///
/// # async fn example() -> tw_mcp_client::error::Result<()> {
/// # let provider = unimplemented!();
/// let agent = Agent::new(provider, ToolRegistry::new(), AgentConfig::default())?;
/// let messages = agent.run_turn("Which projects are overdue?").await?;
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish()
    }
}

impl Agent {
    /// Creates a new agent instance
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if `max_turns` is zero
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        config: AgentConfig,
    ) -> Result<Self> {
        if config.max_turns == 0 {
            return Err(
                ClientError::Config("max_turns must be greater than 0".to_string()).into(),
            );
        }

        debug!(
            "Created agent: provider={}, model={}, tools={}",
            provider.name(),
            provider.model(),
            tools.len()
        );

        Ok(Self {
            provider,
            tools,
            config,
        })
    }

    /// Runs one turn for `input`
    ///
    /// Returns every message produced during the turn in order: the user
    /// message, each assistant message and each tool result.
    ///
    /// # Errors
    ///
    /// - `ClientError::MaxIterationsExceeded` if the model keeps requesting
    ///   tools past `max_turns` calls
    /// - `ClientError::Timeout` if the turn runs longer than
    ///   `timeout_seconds`
    /// - any provider failure
    pub async fn run_turn(&self, input: &str) -> Result<Vec<Message>> {
        let budget = Duration::from_secs(self.config.timeout_seconds);
        match tokio::time::timeout(budget, self.run_loop(input)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Agent turn timed out after {} seconds",
                    self.config.timeout_seconds
                );
                Err(ClientError::Timeout(self.config.timeout_seconds).into())
            }
        }
    }

    async fn run_loop(&self, input: &str) -> Result<Vec<Message>> {
        let start_time = Instant::now();
        let tool_definitions = self.tools.all_definitions();

        let mut conversation = Conversation::new();
        conversation.add_user_message(input);

        for iteration in 1..=self.config.max_turns {
            debug!("Iteration {}/{}", iteration, self.config.max_turns);

            let completion = self
                .provider
                .complete(conversation.messages(), &tool_definitions)
                .await?;
            if let Some(usage) = &completion.usage {
                conversation.record_usage(usage);
            }

            let message = completion.message;
            let tool_calls = message.tool_calls.clone().unwrap_or_default();
            conversation.add_assistant(message);

            if tool_calls.is_empty() {
                info!(
                    "Agent turn completed in {} iterations, {} ms",
                    iteration,
                    start_time.elapsed().as_millis()
                );
                if let Some(usage) = conversation.usage() {
                    debug!(
                        "Turn token usage: prompt={}, completion={}, total={}",
                        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                    );
                }
                return Ok(conversation.into_messages());
            }

            debug!("Executing {} tool calls", tool_calls.len());
            for tool_call in &tool_calls {
                let content = self.execute_tool_call(tool_call).await;
                conversation.add_tool_result(&tool_call.id, content);
            }
        }

        warn!("Maximum iterations ({}) exceeded", self.config.max_turns);
        Err(ClientError::MaxIterationsExceeded {
            limit: self.config.max_turns,
            message: format!(
                "model still requesting tools after {} calls",
                self.config.max_turns
            ),
        }
        .into())
    }

    /// Executes a single tool call and renders the outcome as the content
    /// of the tool message
    ///
    /// Failures are rendered as `Error: ...` so the model can react to them.
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> String {
        let tool_name = &tool_call.function.name;
        debug!("Executing tool: {}", tool_name);

        let Some(tool_executor) = self.tools.get(tool_name) else {
            warn!("Model requested unknown tool: {}", tool_name);
            return format!("Error: Tool not found: {}", tool_name);
        };

        let raw_args = tool_call.function.arguments.trim();
        let args = if raw_args.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str::<serde_json::Value>(raw_args) {
                Ok(args) => args,
                Err(e) => {
                    return format!(
                        "Error: Failed to parse tool arguments for '{}': {}",
                        tool_name, e
                    )
                }
            }
        };

        match tool_executor.execute(args).await {
            Ok(result) => {
                let original_len = result.output.len();
                let result = result.truncate_if_needed(self.config.max_tool_output);
                if result.truncated {
                    debug!(
                        "Tool output truncated from {} to {} bytes",
                        original_len, self.config.max_tool_output
                    );
                }
                result.to_message()
            }
            Err(e) => {
                warn!("Tool '{}' execution failed: {}", tool_name, e);
                format!("Error: Tool '{}' execution failed: {}", tool_name, e)
            }
        }
    }

    /// Returns the number of registered tools
    pub fn num_tools(&self) -> usize {
        self.tools.len()
    }

    /// Model identifier this agent talks to
    pub fn model(&self) -> &str {
        self.provider.model()
    }
}
