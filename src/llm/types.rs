use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ApiError;

/// One message in the chat context sent to the model. Mirrors the wire
/// shape of the OpenAI chat protocol: tool-call echoes and tool results
/// carry extra correlation fields, plain turns do not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Raw tool_calls payload echoed back on assistant turns that
    /// requested tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    pub fn assistant_with_tools(content: Option<String>, tool_calls: Value) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(call_id: &str, tool_name: &str, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
            name: Some(tool_name.to_string()),
        }
    }
}

/// A tool request extracted from a model reply.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Correlating identifier assigned by the model provider.
    pub id: String,
    pub name: String,
    /// Parsed argument object (the wire format carries it as a JSON string).
    pub arguments: Value,
}

/// A model reply: either a plain answer or one or more tool invocations.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    /// Wire-shaped tool_calls payload, kept so the reply can be echoed back
    /// into the context verbatim.
    pub raw_tool_calls: Option<Value>,
}

impl AssistantReply {
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// One chat-completion round: full message context plus tool schemas in,
    /// plain text or tool invocations out.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<AssistantReply, ApiError>;
}
