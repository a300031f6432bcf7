//! Ollama provider implementation for tw-client
//!
//! Talks to a local or remote Ollama server through the non-streaming
//! `/api/chat` endpoint, with tool calling support.

use crate::config::OllamaConfig;
use crate::error::{ClientError, Result};
use crate::providers::{
    validate_message_sequence, CompletionResponse, FunctionCall, Message, Provider, Role,
    TokenUsage, ToolCall,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use tw_mcp_client::config::OllamaConfig;
/// use tw_mcp_client::providers::{OllamaProvider, Provider, Message};
///
/// # async fn example() -> tw_mcp_client::error::Result<()> {
/// let config = OllamaConfig {
///     host: "http://localhost:11434".to_string(),
/// };
/// let provider = OllamaProvider::new(config, "llama3.2")?;
/// let completion = provider.complete(&[Message::user("Hello!")], &[]).await?;
/// println!("{:?}", completion.message.content);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    model: String,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

/// Message structure for Ollama API
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

/// Tool definition for Ollama API
#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Tool call in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "default_tool_type")]
    r#type: String,
    function: OllamaFunctionCall,
}

/// Ollama sends arguments as a JSON object, not a string.
#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

fn default_tool_type() -> String {
    "function".to_string()
}

/// Response structure from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::config::OllamaConfig;
    /// use tw_mcp_client::providers::OllamaProvider;
    ///
    /// let config = OllamaConfig {
    ///     host: "http://localhost:11434".to_string(),
    /// };
    /// let provider = OllamaProvider::new(config, "llama3.2:latest");
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: OllamaConfig, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("tw-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            model
        );

        Ok(Self {
            client,
            config,
            model,
        })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        validate_message_sequence(messages)
            .iter()
            .filter_map(|m| {
                if m.content.is_none() && m.tool_calls.is_none() {
                    return None;
                }

                let tool_calls = m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| OllamaToolCall {
                            id: tc.id.clone(),
                            r#type: "function".to_string(),
                            function: OllamaFunctionCall {
                                name: tc.function.name.clone(),
                                arguments: serde_json::from_str(&tc.function.arguments)
                                    .unwrap_or(serde_json::Value::Object(serde_json::Map::new())),
                            },
                        })
                        .collect()
                });

                Some(OllamaMessage {
                    role: m.role,
                    content: m.content.clone().unwrap_or_default(),
                    tool_calls,
                })
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[serde_json::Value]) -> Vec<OllamaTool> {
        tools
            .iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                let name = obj.get("name")?.as_str()?.to_string();
                let description = obj
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string();
                let parameters = obj.get("parameters")?.clone();

                Some(OllamaTool {
                    r#type: "function".to_string(),
                    function: OllamaFunction {
                        name,
                        description,
                        parameters,
                    },
                })
            })
            .collect()
    }

    /// Ollama omits call ids; synthesize stable ones so tool results can be
    /// paired with their calls.
    fn convert_response_message(&self, ollama_msg: OllamaMessage) -> Message {
        match ollama_msg.tool_calls {
            Some(tool_calls) if !tool_calls.is_empty() => {
                let stamp = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis();
                let converted: Vec<ToolCall> = tool_calls
                    .into_iter()
                    .enumerate()
                    .map(|(idx, tc)| ToolCall {
                        id: if tc.id.is_empty() {
                            format!("call_{}_{}", stamp, idx)
                        } else {
                            tc.id
                        },
                        function: FunctionCall {
                            name: tc.function.name,
                            arguments: serde_json::to_string(&tc.function.arguments)
                                .unwrap_or_else(|_| "{}".to_string()),
                        },
                    })
                    .collect();
                Message::assistant_with_tools(converted)
            }
            _ => Message::assistant(ollama_msg.content),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));

        let ollama_request = OllamaRequest {
            model: self.model.clone(),
            messages: self.convert_messages(messages),
            tools: self.convert_tools(tools),
            stream: false,
        };

        tracing::debug!(
            "Sending Ollama request: {} messages, {} tools",
            ollama_request.messages.len(),
            ollama_request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                ClientError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(ClientError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            ClientError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        let message = self.convert_response_message(ollama_response.message);

        if ollama_response.prompt_eval_count > 0 || ollama_response.eval_count > 0 {
            let usage = TokenUsage::new(
                ollama_response.prompt_eval_count,
                ollama_response.eval_count,
            );
            Ok(CompletionResponse::with_usage(message, usage))
        } else {
            Ok(CompletionResponse::new(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OllamaProvider {
        OllamaProvider::new(
            OllamaConfig {
                host: "http://localhost:11434".to_string(),
            },
            "llama3.2:latest",
        )
        .unwrap()
    }

    #[test]
    fn test_ollama_provider_accessors() {
        let provider = provider();
        assert_eq!(provider.host(), "http://localhost:11434");
        assert_eq!(provider.model(), "llama3.2:latest");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_convert_messages_basic() {
        let messages = vec![
            Message::system("You are a helpful assistant"),
            Message::user("Hello"),
            Message::assistant("Hi there"),
        ];

        let converted = provider().convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, Role::System);
        assert_eq!(converted[1].role, Role::User);
        assert_eq!(converted[2].role, Role::Assistant);
    }

    #[test]
    fn test_convert_messages_parses_arguments_into_object() {
        let tool_call = ToolCall {
            id: "call_123".to_string(),
            function: FunctionCall {
                name: "twprojects-get_project".to_string(),
                arguments: r#"{"id":42}"#.to_string(),
            },
        };

        let converted =
            provider().convert_messages(&[Message::assistant_with_tools(vec![tool_call])]);
        let calls = converted[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments["id"], 42);
    }

    #[test]
    fn test_convert_messages_drops_orphan_tool() {
        let messages = vec![Message::user("hi"), Message::tool_result("missing", "x")];
        assert_eq!(provider().convert_messages(&messages).len(), 1);
    }

    #[test]
    fn test_convert_tools_allows_missing_description() {
        let tools = vec![serde_json::json!({
            "name": "twprojects-list_projects",
            "parameters": { "type": "object" }
        })];

        let converted = provider().convert_tools(&tools);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].function.name, "twprojects-list_projects");
        assert_eq!(converted[0].function.description, "");
    }

    #[test]
    fn test_convert_response_message_text() {
        let msg = provider().convert_response_message(OllamaMessage {
            role: Role::Assistant,
            content: "Hello!".to_string(),
            tool_calls: None,
        });
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.as_deref(), Some("Hello!"));
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_convert_response_message_synthesizes_missing_ids() {
        let msg = provider().convert_response_message(OllamaMessage {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(vec![OllamaToolCall {
                id: String::new(),
                r#type: "function".to_string(),
                function: OllamaFunctionCall {
                    name: "twprojects-list_projects".to_string(),
                    arguments: serde_json::json!({}),
                },
            }]),
        });

        let calls = msg.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[0].function.arguments, "{}");
    }
}
