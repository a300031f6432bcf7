/*!
Command handlers for the CLI

This module provides the handler invoked by the CLI entrypoint:

- `chat` - Interactive session runner

The handler composes the MCP session, its tools, the model provider and
the agent.
*/

use crate::agent::Agent;
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::mcp::session::McpSession;
use crate::providers::{create_provider, Message, Role};
use crate::tools::load_mcp_tools;
use async_trait::async_trait;
use std::future::Future;
use std::io::Write;

// Chat command handler
pub mod chat {
    //! Interactive session runner.
    //!
    //! Opens the MCP session, discovers its tools, builds the agent and runs
    //! a readline loop that submits each line to the agent as one turn. The
    //! session is released exactly once, however the loop ends.

    use super::*;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Prompt shown before each input line
    pub const PROMPT: &str = "tw-client> ";

    /// Printed when the user leaves the loop
    pub const FAREWELL: &str = "Chat ended. Goodbye!";

    /// Printed when a turn produced no messages at all
    pub const NO_RESPONSE: &str = "No response received.";

    /// Input that ends the loop, compared trimmed and lowercased
    pub const EXIT_COMMAND: &str = "exit";

    /// Source of user input lines
    pub trait LineSource {
        /// Read one line after showing `prompt`
        ///
        /// Returns `Ok(None)` at end of input or when the user interrupts
        /// the prompt.
        fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
    }

    /// [`LineSource`] backed by a rustyline editor with in-memory history
    pub struct ReadlineSource {
        editor: DefaultEditor,
    }

    impl ReadlineSource {
        /// Create the line editor
        ///
        /// # Errors
        ///
        /// Returns `ClientError::Readline` if the terminal cannot be set up
        pub fn new() -> Result<Self> {
            let editor = DefaultEditor::new().map_err(ClientError::from)?;
            Ok(Self { editor })
        }
    }

    impl LineSource for ReadlineSource {
        fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
            match self.editor.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                            tracing::debug!("Failed to record history entry: {}", e);
                        }
                    }
                    Ok(Some(line))
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::debug!("Prompt interrupted");
                    Ok(None)
                }
                Err(ReadlineError::Eof) => {
                    tracing::debug!("End of input");
                    Ok(None)
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    Err(ClientError::Readline(err).into())
                }
            }
        }
    }

    /// Something that answers one user input with the messages of a turn
    #[async_trait]
    pub trait TurnRunner {
        /// Run one turn for `input`
        async fn run_turn(&self, input: &str) -> Result<Vec<Message>>;
    }

    #[async_trait]
    impl TurnRunner for Agent {
        async fn run_turn(&self, input: &str) -> Result<Vec<Message>> {
            Agent::run_turn(self, input).await
        }
    }

    /// What to show for the messages of one turn
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Reply<'a> {
        /// Content of the last assistant message
        Text(&'a str),
        /// The turn produced no messages
        NoResponse,
        /// The turn produced messages, none of them from the assistant
        NoAssistantMessage,
    }

    /// Pick the reply to print for a turn
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::commands::chat::{select_reply, Reply};
    /// use tw_mcp_client::providers::Message;
    ///
    /// let messages = vec![Message::user("hi"), Message::assistant("hello")];
    /// assert_eq!(select_reply(&messages), Reply::Text("hello"));
    /// assert_eq!(select_reply(&[]), Reply::NoResponse);
    /// ```
    pub fn select_reply(messages: &[Message]) -> Reply<'_> {
        if messages.is_empty() {
            return Reply::NoResponse;
        }
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| Reply::Text(m.content.as_deref().unwrap_or_default()))
            .unwrap_or(Reply::NoAssistantMessage)
    }

    /// True when `line` asks to leave the loop
    pub fn is_exit_command(line: &str) -> bool {
        line.trim().to_lowercase() == EXIT_COMMAND
    }

    /// Run the read / turn / print loop until the user leaves
    ///
    /// Each line other than the exit command, an empty line included, is
    /// one turn. Turns run one at a time. Ctrl-C while a turn is running
    /// abandons the turn and ends the loop like the exit command.
    ///
    /// # Errors
    ///
    /// Returns the first input, turn or output failure.
    pub async fn interactive_loop<L, R, W>(lines: &mut L, runner: &R, out: &mut W) -> Result<()>
    where
        L: LineSource + ?Sized,
        R: TurnRunner + ?Sized,
        W: Write + ?Sized,
    {
        interactive_loop_until(lines, runner, out, wait_for_ctrl_c).await
    }

    /// [`interactive_loop`] with a custom interrupt source
    ///
    /// `interrupt` is called once per turn; the turn is abandoned if the
    /// returned future completes first.
    pub async fn interactive_loop_until<L, R, W, I, F>(
        lines: &mut L,
        runner: &R,
        out: &mut W,
        mut interrupt: I,
    ) -> Result<()>
    where
        L: LineSource + ?Sized,
        R: TurnRunner + ?Sized,
        W: Write + ?Sized,
        I: FnMut() -> F,
        F: Future<Output = ()>,
    {
        loop {
            let Some(line) = lines.read_line(PROMPT)? else {
                writeln!(out, "{}", FAREWELL)?;
                return Ok(());
            };

            if is_exit_command(&line) {
                writeln!(out, "{}", FAREWELL)?;
                return Ok(());
            }

            let messages = tokio::select! {
                result = runner.run_turn(&line) => result?,
                () = interrupt() => {
                    tracing::warn!("Turn interrupted; ending the session");
                    writeln!(out)?;
                    writeln!(out, "{}", FAREWELL)?;
                    return Ok(());
                }
            };

            match select_reply(&messages) {
                Reply::Text(text) => writeln!(out, "{}", text)?,
                Reply::NoResponse => writeln!(out, "{}", NO_RESPONSE)?,
                Reply::NoAssistantMessage => tracing::warn!(
                    "Turn produced {} messages but none from the assistant",
                    messages.len()
                ),
            }
            out.flush()?;
        }
    }

    /// Resolves on SIGINT. Never resolves if the handler cannot be installed.
    async fn wait_for_ctrl_c() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }

    /// Start the interactive session
    ///
    /// # Errors
    ///
    /// Any startup failure (session, tool discovery, provider) or turn
    /// failure. The session is released before the error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::commands::chat;
    /// use tw_mcp_client::config::Config;
    ///
    /// // In application code:
    /// // chat::run_chat(config).await?;
    /// ```
    pub async fn run_chat(config: Config) -> Result<()> {
        tracing::info!("Starting interactive session");

        let mut lines = ReadlineSource::new()?;
        let session = McpSession::open(&config.session).await?;
        run_with_session(session, &config, &mut lines, &mut std::io::stdout()).await
    }

    /// Drive an open session and release it
    ///
    /// Consumes the session: it is closed exactly once whether the chat
    /// ends normally or with an error. A chat error takes precedence over a
    /// close error.
    pub async fn run_with_session<L, W>(
        session: McpSession,
        config: &Config,
        lines: &mut L,
        out: &mut W,
    ) -> Result<()>
    where
        L: LineSource + ?Sized,
        W: Write + ?Sized,
    {
        let result = chat_in_session(&session, config, lines, out).await;
        let closed = session.close().await;
        result.and(closed)
    }

    async fn chat_in_session<L, W>(
        session: &McpSession,
        config: &Config,
        lines: &mut L,
        out: &mut W,
    ) -> Result<()>
    where
        L: LineSource + ?Sized,
        W: Write + ?Sized,
    {
        let tools = load_mcp_tools(session).await?;
        let tool_count = tools.len();

        let provider = create_provider(&config.model, &config.providers)?;
        let agent = Agent::new(provider, tools, config.agent.clone())?;

        print_welcome_banner(out, session.label(), tool_count, &config.model.to_string())?;
        interactive_loop(lines, &agent, out).await
    }

    /// Display the one-line banner once the session is ready
    fn print_welcome_banner<W: Write + ?Sized>(
        out: &mut W,
        server: &str,
        tool_count: usize,
        model: &str,
    ) -> Result<()> {
        use colored::Colorize;

        writeln!(
            out,
            "Connected to {} ({} tools, model {}). Type '{}' to quit.",
            server.bold(),
            tool_count.to_string().green(),
            model.cyan(),
            EXIT_COMMAND
        )?;
        Ok(())
    }

}
