use crate::config::TaskConfig;
use crate::errors::{AgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `(name, description, parameters)` triple advertised to the model for
/// one registered action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One tool invocation requested by the model. Arguments arrive as raw
/// text and are parsed and validated before any execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// What one model round-trip produced: free text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// One turn of the append-only conversation, in chat-completions wire
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The assistant turn exactly as received, tool-call requests included.
    pub fn assistant(turn: &ModelTurn) -> Self {
        let tool_calls = if turn.tool_calls.is_empty() {
            None
        } else {
            Some(
                turn.tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {"name": call.name, "arguments": call.arguments},
                        })
                    })
                    .collect(),
            )
        };
        Self {
            role: "assistant".to_string(),
            content: turn.text.clone(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// The result of one dispatched tool call, tied back to its request.
    pub fn tool_result(call_id: &str, payload: &Value) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(payload.to_string()),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
        }
    }
}

/// Transport to the hosted model. One method; retries, auth and endpoint
/// details live behind it.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelTurn>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    model: String,
    api_key: Option<String>,
    base_url: String,
    default_query: Vec<(String, String)>,
    default_headers: Vec<(String, String)>,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

impl OpenAiClient {
    pub fn from_config(config: &TaskConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            model: config.model.clone(),
            api_key: config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok()),
            base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_query: config
                .api_default_query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            default_headers: config
                .api_default_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn parse_turn(body: &Value) -> Result<ModelTurn> {
        if let Some(error) = body.get("error") {
            let message = error["message"].as_str().unwrap_or("unknown API error");
            return Err(AgentError::Model(message.to_string()));
        }

        let message = body["choices"]
            .get(0)
            .map(|choice| &choice["message"])
            .ok_or_else(|| AgentError::Model(format!("no choices in response: {body}")))?;

        let text = message["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| ToolCall {
                        id: call["id"].as_str().unwrap_or_default().to_string(),
                        name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                        arguments: call["function"]["arguments"]
                            .as_str()
                            .unwrap_or("{}")
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ModelTurn { text, tool_calls })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> Result<ModelTurn> {
        let tool_payload: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect();

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "tools": tool_payload,
                "tool_choice": "auto",
            }));

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        for (name, value) in &self.default_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !self.default_query.is_empty() {
            request = request.query(&self.default_query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::Model(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Model(e.to_string()))?;

        Self::parse_turn(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_turn_reads_text_and_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "thinking",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "click_element", "arguments": "{\"element\":\"abc\"}"},
                    }],
                },
            }],
        });
        let turn = OpenAiClient::parse_turn(&body).unwrap();
        assert_eq!(turn.text.as_deref(), Some("thinking"));
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "click_element");
    }

    #[test]
    fn parse_turn_surfaces_api_errors() {
        let body = json!({"error": {"message": "bad key"}});
        let error = OpenAiClient::parse_turn(&body).unwrap_err();
        assert!(error.to_string().contains("bad key"));
    }

    #[test]
    fn assistant_message_carries_tool_call_requests() {
        let turn = ModelTurn {
            text: None,
            tool_calls: vec![ToolCall {
                id: "call_9".to_string(),
                name: "navigate".to_string(),
                arguments: "{\"url\":\"https://example.com\"}".to_string(),
            }],
        };
        let message = ChatMessage::assistant(&turn);
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls[0]["function"]["name"], "navigate");
        assert_eq!(calls[0]["id"], "call_9");
    }
}
