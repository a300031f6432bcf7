//! Per-turn conversation state
//!
//! A [`Conversation`] collects the messages exchanged during one agent turn
//! and accumulates the token usage the provider reports for it.

use crate::providers::{Message, TokenUsage};

/// Messages of one agent turn, in order
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    usage: Option<TokenUsage>,
}

impl Conversation {
    /// Creates an empty conversation
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::agent::Conversation;
    ///
    /// let conversation = Conversation::new();
    /// assert!(conversation.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user message to the conversation
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::agent::Conversation;
    ///
    /// let mut conversation = Conversation::new();
    /// conversation.add_user_message("List my projects");
    /// assert_eq!(conversation.len(), 1);
    /// ```
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Adds a system message to the conversation
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::system(content));
    }

    /// Adds a message produced by the model, tool calls included
    pub fn add_assistant(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Adds a tool result answering `tool_call_id`
    pub fn add_tool_result(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.messages.push(Message::tool_result(tool_call_id, content));
    }

    /// Adds provider-reported usage to the running total
    pub fn record_usage(&mut self, usage: &TokenUsage) {
        let total = self.usage.get_or_insert_with(TokenUsage::default);
        total.prompt_tokens += usage.prompt_tokens;
        total.completion_tokens += usage.completion_tokens;
        total.total_tokens += usage.total_tokens;
    }

    /// Usage accumulated so far, if the provider reported any
    pub fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }

    /// Returns all messages in the conversation
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages in the conversation
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the conversation has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Consumes the conversation, returning its messages
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
