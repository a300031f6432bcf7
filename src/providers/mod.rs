//! Provider module for tw-client
//!
//! This module contains the model provider abstraction, the model
//! identifier parser, and the OpenAI and Ollama implementations.

pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{
    validate_message_sequence, CompletionResponse, FunctionCall, Message, Provider, Role,
    TokenUsage, ToolCall,
};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use std::fmt;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::{ClientError, Result};

/// Provider used when the identifier carries no known prefix.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Provider prefixes understood in `provider:model` identifiers.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "ollama"];

/// OpenAI fine-tuned model ids (`ft:gpt-4o:org:name:id`) start with this.
const OPENAI_FINE_TUNE_PREFIX: &str = "ft";

/// A parsed `provider:model` identifier
///
/// Only the first colon splits, so model names that contain colons
/// themselves (`ollama:llama3.2:latest`) survive intact. A name without a
/// colon is an OpenAI model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Backend name, one of [`KNOWN_PROVIDERS`]
    pub provider: String,
    /// Model name passed to the backend
    pub model: String,
}

impl ModelSpec {
    /// Parse a model identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::providers::ModelSpec;
    ///
    /// let spec = ModelSpec::parse("openai:gpt-4.1").unwrap();
    /// assert_eq!(spec.provider, "openai");
    /// assert_eq!(spec.model, "gpt-4.1");
    ///
    /// let bare = ModelSpec::parse("gpt-4o-mini").unwrap();
    /// assert_eq!(bare.provider, "openai");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the model part is empty or the
    /// identifier names a provider other than [`KNOWN_PROVIDERS`].
    pub fn parse(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();

        let (provider, model) = match identifier.split_once(':') {
            Some((prefix, rest)) => {
                let prefix = prefix.trim().to_ascii_lowercase();
                if KNOWN_PROVIDERS.contains(&prefix.as_str()) {
                    (prefix, rest.trim())
                } else if prefix == OPENAI_FINE_TUNE_PREFIX {
                    (DEFAULT_PROVIDER.to_string(), identifier)
                } else {
                    return Err(ClientError::Config(format!(
                        "Unknown provider '{}' in model identifier '{}'; supported providers: {}",
                        prefix,
                        identifier,
                        KNOWN_PROVIDERS.join(", ")
                    ))
                    .into());
                }
            }
            None => (DEFAULT_PROVIDER.to_string(), identifier),
        };

        if model.is_empty() {
            return Err(ClientError::Config(format!(
                "Invalid model identifier '{}': model name is empty",
                identifier
            ))
            .into());
        }

        Ok(Self {
            provider,
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Create a provider instance for a parsed model identifier
///
/// # Errors
///
/// Returns error if the provider is unknown or its initialization fails
/// (for OpenAI, a missing API key).
pub fn create_provider(spec: &ModelSpec, config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    match spec.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            config.openai.clone(),
            spec.model.clone(),
        )?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(
            config.ollama.clone(),
            spec.model.clone(),
        )?)),
        other => Err(ClientError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}
