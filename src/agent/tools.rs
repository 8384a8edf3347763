use std::sync::Arc;

use serde_json::{json, Value};

use crate::embeddings::EmbeddingClient;
use crate::errors::ApiError;
use crate::store::IndexStore;

/// Number of chunks returned by the similarity-search tool.
const RAG_TOP_K: usize = 6;

/// The closed set of tools the model may call. Dispatch goes through this
/// enum so every variant has a handler; unrecognized names are handled once,
/// at parse, not in a default branch of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    RagSearch,
    ListDocuments,
    GetFileContents,
    QueryDocumentRows,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rag_search" => Some(Self::RagSearch),
            "list_documents" => Some(Self::ListDocuments),
            "get_file_contents" => Some(Self::GetFileContents),
            "query_document_rows" => Some(Self::QueryDocumentRows),
            _ => None,
        }
    }
}

/// Tool schemas advertised to the model on every round.
pub fn tool_schemas() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": "rag_search",
                "description": "RAG search using vector similarity",
                "parameters": {
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "list_documents",
                "description": "List available documents and schemas",
                "parameters": {"type": "object", "properties": {}}
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "get_file_contents",
                "description": "Get merged text of a document",
                "parameters": {
                    "type": "object",
                    "properties": {"file_id": {"type": "string"}},
                    "required": ["file_id"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "query_document_rows",
                "description": "Run SELECT over document_rows",
                "parameters": {
                    "type": "object",
                    "properties": {"sql_query": {"type": "string"}},
                    "required": ["sql_query"]
                }
            }
        }),
    ]
}

/// Bridges agent-issued tool calls to the index store.
#[derive(Clone)]
pub struct RetrievalTools {
    index: Arc<IndexStore>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl RetrievalTools {
    pub fn new(index: Arc<IndexStore>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { index, embedder }
    }

    pub async fn dispatch(&self, kind: ToolKind, args: &Value) -> Result<Value, ApiError> {
        match kind {
            ToolKind::RagSearch => {
                let query = required_str(args, "query")?;
                self.rag_search(query).await
            }
            ToolKind::ListDocuments => self.list_documents().await,
            ToolKind::GetFileContents => {
                let file_id = required_str(args, "file_id")?;
                self.get_file_contents(file_id).await
            }
            ToolKind::QueryDocumentRows => {
                let sql = required_str(args, "sql_query")?;
                self.query_document_rows(sql).await
            }
        }
    }

    async fn rag_search(&self, query: &str) -> Result<Value, ApiError> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .first()
            .ok_or_else(|| ApiError::Embedding("no vector for query".to_string()))?;
        let hits = self
            .index
            .similarity_search(vector, RAG_TOP_K, &json!({}))
            .await?;
        serde_json::to_value(hits).map_err(ApiError::internal)
    }

    async fn list_documents(&self) -> Result<Value, ApiError> {
        let documents = self.index.list_documents().await?;
        serde_json::to_value(documents).map_err(ApiError::internal)
    }

    async fn get_file_contents(&self, file_id: &str) -> Result<Value, ApiError> {
        let contents = self.index.merged_contents(file_id).await?;
        Ok(Value::String(contents))
    }

    async fn query_document_rows(&self, sql: &str) -> Result<Value, ApiError> {
        let rows = self.index.query_rows(sql).await?;
        Ok(Value::Array(rows))
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest(format!("tool call missing argument `{}`", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for name in [
            "rag_search",
            "list_documents",
            "get_file_contents",
            "query_document_rows",
        ] {
            assert!(ToolKind::from_name(name).is_some(), "{name} should parse");
        }
        assert!(ToolKind::from_name("delete_everything").is_none());
    }

    #[test]
    fn schemas_cover_every_tool() {
        let schemas = tool_schemas();
        assert_eq!(schemas.len(), 4);
        for schema in &schemas {
            let name = schema["function"]["name"].as_str().unwrap();
            assert!(ToolKind::from_name(name).is_some());
        }
    }
}
