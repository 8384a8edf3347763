use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use async_trait::async_trait;

use super::types::{AssistantReply, ChatClient, ChatMessage, ToolInvocation};
use crate::config::AppConfig;
use crate::errors::ApiError;

/// Chat-completions client for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.chat_model.clone(),
        })
    }

    fn parse_reply(payload: &Value) -> Result<AssistantReply, ApiError> {
        let message = &payload["choices"][0]["message"];
        if message.is_null() {
            return Err(ApiError::upstream(502, "reply carried no message"));
        }

        let content = message["content"].as_str().map(|s| s.to_string());
        let raw_tool_calls = message.get("tool_calls").filter(|v| !v.is_null()).cloned();

        let mut tool_calls = Vec::new();
        if let Some(calls) = raw_tool_calls.as_ref().and_then(|v| v.as_array()) {
            for call in calls {
                let id = call["id"].as_str().unwrap_or_default().to_string();
                let name = call["function"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let raw_args = call["function"]["arguments"].as_str().unwrap_or("{}");
                let arguments =
                    serde_json::from_str::<Value>(raw_args).unwrap_or_else(|_| json!({}));
                tool_calls.push(ToolInvocation {
                    id,
                    name,
                    arguments,
                });
            }
        }

        Ok(AssistantReply {
            content,
            tool_calls,
            raw_tool_calls,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<AssistantReply, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2,
        });
        if !tools.is_empty() {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("tools".to_string(), json!(tools));
                obj.insert("tool_choice".to_string(), json!("auto"));
            }
        }

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::upstream(502, e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(status.as_u16(), text));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::upstream(502, e.to_string()))?;

        Self::parse_reply(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_reply() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
        });
        let reply = OpenAiChatClient::parse_reply(&payload).unwrap();
        assert!(reply.is_final());
        assert_eq!(reply.content.as_deref(), Some("hi there"));
    }

    #[test]
    fn parses_tool_calls_with_string_arguments() {
        let payload = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "rag_search", "arguments": "{\"query\":\"llamas\"}"}
                }]
            }}]
        });
        let reply = OpenAiChatClient::parse_reply(&payload).unwrap();
        assert!(!reply.is_final());
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "rag_search");
        assert_eq!(reply.tool_calls[0].arguments["query"], "llamas");
        assert!(reply.raw_tool_calls.is_some());
    }

    #[test]
    fn malformed_arguments_fall_back_to_empty_object() {
        let payload = json!({
            "choices": [{"message": {
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "function": {"name": "list_documents", "arguments": "not json"}
                }]
            }}]
        });
        let reply = OpenAiChatClient::parse_reply(&payload).unwrap();
        assert_eq!(reply.tool_calls[0].arguments, json!({}));
    }

    #[test]
    fn missing_message_is_an_upstream_error() {
        let payload = json!({"choices": []});
        assert!(OpenAiChatClient::parse_reply(&payload).is_err());
    }
}
