//! Command-line interface definition for tw-client
//!
//! Three options, all optional. The bearer token stays an `Option` here;
//! the environment fallback happens once in
//! [`crate::config::resolve_bearer_token`].

use clap::Parser;

/// Default remote MCP endpoint.
pub const DEFAULT_SERVER: &str = "https://mcp.ai.teamwork.com";

/// Default model identifier handed to the agent.
pub const DEFAULT_LLM_MODEL: &str = "openai:gpt-4.1";

/// tw-client - chat with an LLM agent backed by Teamwork.com MCP tools
#[derive(Parser, Debug, Clone)]
#[command(name = "tw-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// MCP server endpoint
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Bearer token for the MCP server (falls back to TW_MCP_BEARER_TOKEN)
    #[arg(long)]
    pub bearer_token: Option<String>,

    /// Model identifier, e.g. openai:gpt-4.1 or ollama:llama3.2
    #[arg(long, default_value = DEFAULT_LLM_MODEL)]
    pub llm_model: String,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["tw-client"]).unwrap();
        assert_eq!(cli.server, "https://mcp.ai.teamwork.com");
        assert_eq!(cli.llm_model, "openai:gpt-4.1");
        assert!(cli.bearer_token.is_none());
    }

    #[test]
    fn test_cli_all_flags() {
        let cli = Cli::try_parse_from([
            "tw-client",
            "--server",
            "http://localhost:8080/mcp",
            "--bearer-token",
            "tw-secret",
            "--llm-model",
            "ollama:llama3.2",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://localhost:8080/mcp");
        assert_eq!(cli.bearer_token.as_deref(), Some("tw-secret"));
        assert_eq!(cli.llm_model, "ollama:llama3.2");
    }

    #[test]
    fn test_cli_equals_syntax() {
        let cli = Cli::try_parse_from(["tw-client", "--bearer-token=abc"]).unwrap();
        assert_eq!(cli.bearer_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_cli_explicit_empty_token_is_kept() {
        let cli = Cli::try_parse_from(["tw-client", "--bearer-token", ""]).unwrap();
        assert_eq!(cli.bearer_token.as_deref(), Some(""));
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        let result = Cli::try_parse_from(["tw-client", "--config", "x.yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_positional_arguments() {
        let result = Cli::try_parse_from(["tw-client", "chat"]);
        assert!(result.is_err());
    }
}
