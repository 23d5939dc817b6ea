//! `OpenAI` chat-completions provider, direct or through an Azure deployment

use super::types::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Where chat-completion requests are sent and how they authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAIEndpoint {
    /// `OpenAI` or any compatible server; bearer auth
    OpenAI { base_url: Option<String> },
    /// Azure `OpenAI` deployment; `api-key` header auth
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

impl OpenAIEndpoint {
    pub fn url(&self) -> String {
        match self {
            OpenAIEndpoint::OpenAI { base_url } => format!(
                "{}/chat/completions",
                base_url
                    .as_deref()
                    .unwrap_or(DEFAULT_BASE_URL)
                    .trim_end_matches('/')
            ),
            OpenAIEndpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
        }
    }

    fn is_azure(&self) -> bool {
        matches!(self, OpenAIEndpoint::Azure { .. })
    }
}

/// OpenAI-compatible service implementation
pub struct OpenAIService {
    client: Client,
    api_key: String,
    model: String,
    endpoint: OpenAIEndpoint,
    url: String,
}

impl OpenAIService {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: OpenAIEndpoint,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        let url = endpoint.url();
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint,
            url,
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> OpenAIRequest {
        let mut messages = Vec::new();

        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for msg in &request.messages {
            messages.extend(Self::translate_message(msg));
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| OpenAITool {
                        r#type: "function".to_string(),
                        function: OpenAIFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            tools,
            max_tokens: request.max_tokens,
        }
    }

    /// Translate one message. Tool results become separate `tool` messages.
    fn translate_message(msg: &LlmMessage) -> Vec<OpenAIMessage> {
        let role = match msg.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut messages = Vec::new();
        let mut tool_results = Vec::new();

        for block in &msg.content {
            match block {
                ContentBlock::Text { text } => text_parts.push(text.clone()),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(OpenAIToolCall {
                    id: id.clone(),
                    r#type: "function".to_string(),
                    function: OpenAIFunctionCall {
                        name: name.clone(),
                        arguments: input.to_string(),
                    },
                }),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => tool_results.push(OpenAIMessage {
                    role: "tool".to_string(),
                    content: Some(if *is_error {
                        format!("Error: {content}")
                    } else {
                        content.clone()
                    }),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id.clone()),
                }),
            }
        }

        if !text_parts.is_empty() || !tool_calls.is_empty() {
            messages.push(OpenAIMessage {
                role: role.to_string(),
                content: (!text_parts.is_empty()).then(|| text_parts.join("\n")),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            });
        }
        messages.extend(tool_results);

        if messages.is_empty() {
            messages.push(OpenAIMessage {
                role: role.to_string(),
                content: Some(String::new()),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        messages
    }

    fn normalize_response(resp: OpenAIResponse) -> Result<LlmResponse, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))?;

        let mut content = Vec::new();

        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::Text { text });
            }
        }

        for tc in choice.message.tool_calls.unwrap_or_default() {
            if tc.function.name.is_empty() {
                continue;
            }
            let input = serde_json::from_str(&tc.function.arguments)
                .unwrap_or_else(|_| serde_json::json!({}));
            content.push(ContentBlock::ToolUse {
                id: tc.id,
                name: tc.function.name,
                input,
            });
        }

        let usage = resp.usage.unwrap_or_default();
        Ok(LlmResponse {
            content,
            usage: Usage {
                input_tokens: u64::from(usage.prompt_tokens),
                output_tokens: u64::from(usage.completion_tokens),
            },
        })
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.translate_request(request);

        let builder = self.client.post(&self.url).json(&body);
        let builder = if self.endpoint.is_azure() {
            builder.header("api-key", &self.api_key)
        } else {
            builder.bearer_auth(&self.api_key)
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                LlmError::network(format!("Connection failed: {e}"))
            } else {
                LlmError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map_or(body, |parsed| parsed.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        let parsed: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(parsed)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;
    use serde_json::json;

    fn service(endpoint: OpenAIEndpoint) -> OpenAIService {
        OpenAIService::new("sk-test", "gpt-4o", endpoint).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(
            OpenAIEndpoint::OpenAI { base_url: None }.url(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            OpenAIEndpoint::OpenAI {
                base_url: Some("http://localhost:11434/v1/".to_string())
            }
            .url(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            OpenAIEndpoint::Azure {
                endpoint: "https://tutor.openai.azure.com/".to_string(),
                deployment: "gpt4o".to_string(),
                api_version: "2024-06-01".to_string(),
            }
            .url(),
            "https://tutor.openai.azure.com/openai/deployments/gpt4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_translate_request_with_tools_and_results() {
        let svc = service(OpenAIEndpoint::OpenAI { base_url: None });
        let request = LlmRequest {
            system: Some("be brief".to_string()),
            messages: vec![
                LlmMessage::user("[user] https://example.com"),
                LlmMessage {
                    role: MessageRole::Assistant,
                    content: vec![ContentBlock::tool_use(
                        "call_1",
                        "fetch_page_text",
                        json!({"url": "https://example.com"}),
                    )],
                },
                LlmMessage {
                    role: MessageRole::User,
                    content: vec![ContentBlock::tool_result("call_1", "page text", false)],
                },
            ],
            tools: vec![ToolDefinition {
                name: "transfer_to_user".to_string(),
                description: "Hand control back".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
            }],
            max_tokens: None,
        };

        let body = serde_json::to_value(svc.translate_request(&request)).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "fetch_page_text");
        assert!(messages[2].get("content").is_none());
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "transfer_to_user");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_normalize_response_extracts_text_and_tool_calls() {
        let raw: OpenAIResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Here is your outline.",
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "transfer_to_user", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }))
        .unwrap();

        let response = OpenAIService::normalize_response(raw).unwrap();
        assert_eq!(response.text(), "Here is your outline.");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "transfer_to_user");
        assert_eq!(response.usage.input_tokens, 12);
    }

    #[test]
    fn test_normalize_response_without_choices_fails() {
        let raw: OpenAIResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(OpenAIService::normalize_response(raw).is_err());
    }
}
