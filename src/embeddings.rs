use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::ApiError;

/// Batch text-to-vector interface. Output has the same length and order as
/// the input, one vector per string. Failure is fatal to the enclosing unit
/// of work; callers never retry.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}

/// OpenAI-compatible embeddings endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Embedding(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(status.as_u16(), text));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::Embedding(e.to_string()))?;

        let data = payload["data"]
            .as_array()
            .ok_or_else(|| ApiError::Embedding("malformed embeddings response".to_string()))?;

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let vec: Vec<f32> = item["embedding"]
                .as_array()
                .ok_or_else(|| ApiError::Embedding("missing embedding vector".to_string()))?
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            embeddings.push(vec);
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Embedding(format!(
                "expected {} vectors, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}
