//! Bounded tool-calling agent loop.
//!
//! Each `ask` runs its own loop instance: context assembly, up to a fixed
//! number of chat-completion rounds, tool dispatch between rounds, and a
//! single user/assistant pair persisted at the end. Intermediate tool
//! traffic lives only in the in-memory context of the invocation.

pub mod tools;

use serde_json::json;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::history::ConversationStore;
use crate::llm::{ChatClient, ChatMessage};

use tools::{tool_schemas, RetrievalTools, ToolKind};

const SYSTEM_PROMPT: &str = "\
You are a helpful assistant for questions about documents (text or tabular).
Tools you can call:
1) rag_search(query)
2) list_documents()
3) get_file_contents(file_id)
4) query_document_rows(sql_query)
Start with RAG unless SQL is clearly required. Do not fabricate.
";

/// Persisted messages pulled into the context ahead of the new user turn.
const HISTORY_LIMIT: i64 = 8;

/// Hard cap on chat-completion rounds per invocation. The model drives the
/// loop, so the bound is an invariant here rather than a courtesy.
const MAX_MODEL_ROUNDS: usize = 8;

/// Tool results are serialized and clipped before re-entering the context.
const TOOL_RESULT_MAX_CHARS: usize = 8000;

pub struct Agent {
    llm: Arc<dyn ChatClient>,
    history: ConversationStore,
    tools: RetrievalTools,
}

impl Agent {
    pub fn new(llm: Arc<dyn ChatClient>, history: ConversationStore, tools: RetrievalTools) -> Self {
        Self {
            llm,
            history,
            tools,
        }
    }

    /// Answers one user message within a session.
    ///
    /// Terminates either with the model's first plain reply (persisting
    /// exactly one user and one assistant message, however many tool rounds
    /// happened in between) or with an error once the round cap is hit.
    pub async fn ask(&self, session_id: &str, user_text: &str) -> Result<String, ApiError> {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        for stored in self.history.recent_history(session_id, HISTORY_LIMIT).await? {
            messages.push(ChatMessage::text(&stored.role, stored.content));
        }
        messages.push(ChatMessage::user(user_text));

        let schemas = tool_schemas();

        for round in 0..MAX_MODEL_ROUNDS {
            let reply = self.llm.complete(&messages, &schemas).await?;

            if reply.is_final() {
                let answer = reply.content.unwrap_or_default();
                self.history.add_message(session_id, "user", user_text).await?;
                self.history
                    .add_message(session_id, "assistant", &answer)
                    .await?;
                return Ok(answer);
            }

            tracing::debug!(
                round,
                calls = reply.tool_calls.len(),
                "executing tool round"
            );

            let raw_calls = reply.raw_tool_calls.clone().unwrap_or_else(|| json!([]));
            messages.push(ChatMessage::assistant_with_tools(
                reply.content.clone(),
                raw_calls,
            ));

            for call in &reply.tool_calls {
                let output = match ToolKind::from_name(&call.name) {
                    Some(kind) => self.tools.dispatch(kind, &call.arguments).await?,
                    None => json!({"error": format!("unknown tool {}", call.name)}),
                };
                let serialized = truncate_chars(&output.to_string(), TOOL_RESULT_MAX_CHARS);
                messages.push(ChatMessage::tool_result(&call.id, &call.name, serialized));
            }
        }

        Err(ApiError::Internal(format!(
            "model did not produce a final answer within {} rounds",
            MAX_MODEL_ROUNDS
        )))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
