use std::sync::Arc;

use crate::agent::tools::RetrievalTools;
use crate::agent::Agent;
use crate::config::AppConfig;
use crate::embeddings::{EmbeddingClient, OpenAiEmbedder};
use crate::errors::ApiError;
use crate::history::ConversationStore;
use crate::llm::OpenAiChatClient;
use crate::store::IndexStore;

/// Shared application state handed to every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub agent: Agent,
    pub index: Arc<IndexStore>,
    pub embedder: Arc<dyn EmbeddingClient>,
}

impl AppState {
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>, ApiError> {
        config.validate()?;

        let history = ConversationStore::new(config.chat_db_path()).await?;
        let index = Arc::new(IndexStore::new(config.index_db_path()).await?);

        let embedder: Arc<dyn EmbeddingClient> = Arc::new(OpenAiEmbedder::new(&config)?);
        let llm = Arc::new(OpenAiChatClient::new(&config)?);

        let tools = RetrievalTools::new(index.clone(), embedder.clone());
        let agent = Agent::new(llm, history, tools);

        Ok(Arc::new(Self {
            config,
            agent,
            index,
            embedder,
        }))
    }
}
