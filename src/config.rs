//! Configuration resolution for tw-client
//!
//! All configuration is resolved once at startup from the parsed CLI and the
//! process environment, then treated as immutable. The environment is read
//! through a lookup closure so resolution can be tested without touching
//! process-global state.
//!
//! Precedence for the MCP bearer token is `--bearer-token` >
//! `TW_MCP_BEARER_TOKEN` > empty string.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::cli::Cli;
use crate::error::{ClientError, Result};
use crate::providers::ModelSpec;

/// Environment variable consulted when `--bearer-token` is omitted.
pub const BEARER_TOKEN_ENV: &str = "TW_MCP_BEARER_TOKEN";

/// Label of the single configured MCP server entry.
pub const SERVER_LABEL: &str = "Teamwork.com";

/// Default per-request HTTP timeout for the MCP transport.
pub const DEFAULT_MCP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// The MCP session to open
    pub session: SessionConfig,
    /// Model the agent talks to
    pub model: ModelSpec,
    /// Backend endpoints and credentials
    pub providers: ProviderConfig,
    /// Agent loop limits
    pub agent: AgentConfig,
}

/// Transport used to reach the MCP server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// MCP streamable HTTP (POST + optional SSE responses)
    StreamableHttp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::StreamableHttp => write!(f, "streamable_http"),
        }
    }
}

/// One remote MCP server entry
#[derive(Clone)]
pub struct SessionConfig {
    /// Fixed label identifying the entry
    pub label: String,
    /// Server endpoint
    pub server_url: Url,
    /// Bearer credential; may be empty
    pub bearer_token: String,
    /// Transport kind
    pub transport: TransportKind,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("label", &self.label)
            .field("server_url", &self.server_url.as_str())
            .field(
                "bearer_token",
                &if self.bearer_token.is_empty() {
                    "<empty>"
                } else {
                    "<redacted>"
                },
            )
            .field("transport", &self.transport)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SessionConfig {
    /// Headers attached to every request to the server.
    ///
    /// An empty token produces no `Authorization` header at all.
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::config::{SessionConfig, TransportKind, SERVER_LABEL};
    ///
    /// let config = SessionConfig {
    ///     label: SERVER_LABEL.to_string(),
    ///     server_url: "https://mcp.ai.teamwork.com".parse().unwrap(),
    ///     bearer_token: "abc".to_string(),
    ///     transport: TransportKind::StreamableHttp,
    ///     request_timeout: std::time::Duration::from_secs(60),
    /// };
    /// assert_eq!(config.auth_headers()["Authorization"], "Bearer abc");
    /// ```
    pub fn auth_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if !self.bearer_token.is_empty() {
            headers.insert(
                "Authorization".to_string(),
                format!("Bearer {}", self.bearer_token),
            );
        }
        headers
    }
}

/// OpenAI-compatible backend settings
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key from `OPENAI_API_KEY`
    pub api_key: Option<String>,
    /// Base URL from `OPENAI_BASE_URL`
    pub base_url: String,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Ollama backend settings
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Host from `OLLAMA_HOST`
    pub host: String,
}

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// OpenAI settings
    pub openai: OpenAiConfig,
    /// Ollama settings
    pub ollama: OllamaConfig,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig {
                api_key: None,
                base_url: default_openai_base_url(),
            },
            ollama: OllamaConfig {
                host: default_ollama_host(),
            },
        }
    }
}

/// Agent behavior configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of model calls per turn
    pub max_turns: usize,
    /// Timeout for one whole turn (seconds)
    pub timeout_seconds: u64,
    /// Tool output larger than this is truncated before it reaches the model
    pub max_tool_output: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 25,
            timeout_seconds: 600,
            max_tool_output: 1_048_576,
        }
    }
}

/// Resolve the MCP bearer token.
///
/// A supplied flag always wins, even when it is the empty string; otherwise
/// the environment value is used; otherwise the token is empty.
///
/// # Examples
///
/// ```
/// use tw_mcp_client::config::resolve_bearer_token;
///
/// assert_eq!(resolve_bearer_token(Some("flag"), Some("env".into())), "flag");
/// assert_eq!(resolve_bearer_token(None, Some("env".into())), "env");
/// assert_eq!(resolve_bearer_token(None, None), "");
/// ```
pub fn resolve_bearer_token(flag: Option<&str>, env_value: Option<String>) -> String {
    match flag {
        Some(token) => token.to_string(),
        None => env_value.unwrap_or_default(),
    }
}

impl Config {
    /// Resolve configuration from the CLI and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for a malformed server URL or model
    /// identifier.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolve configuration using `env` for environment lookups.
    pub fn resolve<F>(cli: &Cli, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = parse_server_url(&cli.server)?;

        let bearer_token =
            resolve_bearer_token(cli.bearer_token.as_deref(), env(BEARER_TOKEN_ENV));
        if bearer_token.is_empty() {
            tracing::warn!(
                "No bearer token supplied (--bearer-token or {}); connecting without credentials",
                BEARER_TOKEN_ENV
            );
        }

        let model = ModelSpec::parse(&cli.llm_model)?;

        let mut providers = ProviderConfig::default();
        providers.openai.api_key = env("OPENAI_API_KEY").filter(|k| !k.is_empty());
        if let Some(base_url) = env("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            providers.openai.base_url = base_url;
        }
        if let Some(host) = env("OLLAMA_HOST").filter(|v| !v.is_empty()) {
            providers.ollama.host = host;
        }

        let config = Self {
            session: SessionConfig {
                label: SERVER_LABEL.to_string(),
                server_url,
                bearer_token,
                transport: TransportKind::StreamableHttp,
                request_timeout: DEFAULT_MCP_REQUEST_TIMEOUT,
            },
            model,
            providers,
            agent: AgentConfig::default(),
        };

        tracing::debug!(?config, "resolved configuration");
        Ok(config)
    }
}

fn parse_server_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ClientError::Config(format!("Invalid server URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::Config(format!(
            "Invalid server URL '{}': unsupported scheme '{}'",
            raw, other
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["tw-client"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_flag_token_wins_over_env() {
        let config = Config::resolve(
            &cli(&["--bearer-token", "from-flag"]),
            env_from(&[(BEARER_TOKEN_ENV, "from-env")]),
        )
        .unwrap();
        assert_eq!(config.session.bearer_token, "from-flag");
    }

    #[test]
    fn test_env_token_used_when_flag_missing() {
        let config =
            Config::resolve(&cli(&[]), env_from(&[(BEARER_TOKEN_ENV, "from-env")])).unwrap();
        assert_eq!(config.session.bearer_token, "from-env");
    }

    #[test]
    fn test_missing_token_is_empty_not_error() {
        let config = Config::resolve(&cli(&[]), env_from(&[])).unwrap();
        assert_eq!(config.session.bearer_token, "");
        assert!(config.session.auth_headers().is_empty());
    }

    #[test]
    fn test_auth_header_format() {
        let config = Config::resolve(&cli(&["--bearer-token", "tok"]), env_from(&[])).unwrap();
        let headers = config.session.auth_headers();
        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer tok"));
    }

    #[test]
    fn test_session_defaults() {
        let config = Config::resolve(&cli(&[]), env_from(&[])).unwrap();
        assert_eq!(config.session.label, "Teamwork.com");
        assert_eq!(config.session.server_url.as_str(), "https://mcp.ai.teamwork.com/");
        assert_eq!(config.session.transport, TransportKind::StreamableHttp);
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.model.model, "gpt-4.1");
    }

    #[test]
    fn test_invalid_server_url_is_config_error() {
        let err = Config::resolve(&cli(&["--server", "not a url"]), env_from(&[])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let err =
            Config::resolve(&cli(&["--server", "ftp://example.com"]), env_from(&[])).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_provider_settings_from_env() {
        let config = Config::resolve(
            &cli(&[]),
            env_from(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_BASE_URL", "http://localhost:1234/v1"),
                ("OLLAMA_HOST", "http://gpu-box:11434"),
            ]),
        )
        .unwrap();
        assert_eq!(config.providers.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.providers.openai.base_url, "http://localhost:1234/v1");
        assert_eq!(config.providers.ollama.host, "http://gpu-box:11434");
    }

    #[test]
    fn test_empty_api_key_treated_as_missing() {
        let config = Config::resolve(&cli(&[]), env_from(&[("OPENAI_API_KEY", "")])).unwrap();
        assert!(config.providers.openai.api_key.is_none());
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let config =
            Config::resolve(&cli(&["--bearer-token", "super-secret"]), env_from(&[])).unwrap();
        let rendered = format!("{:?}", config.session);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_agent_defaults() {
        let agent = AgentConfig::default();
        assert_eq!(agent.max_turns, 25);
        assert!(agent.timeout_seconds > 0);
        assert!(agent.max_tool_output > 0);
    }
}
