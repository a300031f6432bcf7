//! OpenAI chat-completions provider
//!
//! Sends non-streaming requests to `{base_url}/chat/completions`. The base
//! URL is configurable so any OpenAI-compatible endpoint works.

use crate::config::OpenAiConfig;
use crate::error::{ClientError, Result};
use crate::providers::{
    validate_message_sequence, CompletionResponse, FunctionCall, Message, Provider, Role,
    TokenUsage, ToolCall,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(default = "default_tool_type")]
    r#type: String,
    function: ChatFunctionCall,
}

/// Arguments travel as a JSON-encoded string on this API.
#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiProvider {
    /// Create a provider for `model`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when no API key is configured, or a
    /// provider error if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use tw_mcp_client::config::OpenAiConfig;
    /// use tw_mcp_client::providers::{OpenAiProvider, Provider};
    ///
    /// let config = OpenAiConfig {
    ///     api_key: Some("sk-test".to_string()),
    ///     base_url: "https://api.openai.com/v1".to_string(),
    /// };
    /// let provider = OpenAiProvider::new(config, "gpt-4.1").unwrap();
    /// assert_eq!(provider.model(), "gpt-4.1");
    /// ```
    pub fn new(config: OpenAiConfig, model: impl Into<String>) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ClientError::Config(
                    "OPENAI_API_KEY is not set; it is required for openai models".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("tw-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        let model = model.into();
        tracing::info!(
            "Initialized OpenAI provider: base_url={}, model={}",
            config.base_url,
            model
        );

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<ChatMessage> {
        validate_message_sequence(messages)
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content,
                tool_calls: m.tool_calls.map(|calls| {
                    calls
                        .into_iter()
                        .map(|tc| ChatToolCall {
                            id: tc.id,
                            r#type: default_tool_type(),
                            function: ChatFunctionCall {
                                name: tc.function.name,
                                arguments: tc.function.arguments,
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id,
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[serde_json::Value]) -> Vec<ChatTool> {
        tools
            .iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                Some(ChatTool {
                    r#type: "function",
                    function: ChatFunction {
                        name: obj.get("name")?.as_str()?.to_string(),
                        description: obj
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        parameters: obj.get("parameters")?.clone(),
                    },
                })
            })
            .collect()
    }

    fn convert_response_message(message: ChatMessage) -> Message {
        match message.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let calls = calls
                    .into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        function: FunctionCall {
                            name: tc.function.name,
                            arguments: if tc.function.arguments.trim().is_empty() {
                                "{}".to_string()
                            } else {
                                tc.function.arguments
                            },
                        },
                    })
                    .collect();
                let mut converted = Message::assistant_with_tools(calls);
                converted.content = message.content.filter(|c| !c.is_empty());
                converted
            }
            _ => Message::assistant(message.content.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.convert_messages(messages),
            tools: self.convert_tools(tools),
        };

        tracing::debug!(
            "Sending OpenAI request: {} messages, {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("OpenAI request failed: {}", e);
                ClientError::Provider(format!("OpenAI request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            tracing::error!("OpenAI returned error {}: {}", status, detail);
            return Err(ClientError::Provider(format!(
                "OpenAI returned error {}: {}",
                status, detail
            ))
            .into());
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse OpenAI response: {}", e);
            ClientError::Provider(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Provider("OpenAI response had no choices".to_string()))?;

        tracing::debug!(
            "OpenAI response: finish_reason={}",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        );

        let message = Self::convert_response_message(choice.message);
        Ok(match parsed.usage {
            Some(usage) => CompletionResponse::with_usage(
                message,
                TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            ),
            None => CompletionResponse::new(message),
        })
    }
}
