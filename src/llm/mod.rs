//! Language-model client layer.
//!
//! `ChatClient` is the seam the agent loop drives; the production
//! implementation speaks the OpenAI-compatible chat-completions protocol
//! with function tools.

mod openai;
mod types;

pub use openai::OpenAiChatClient;
pub use types::{AssistantReply, ChatClient, ChatMessage, ToolInvocation};
