use std::env;
use std::path::PathBuf;

use crate::errors::ApiError;

/// Process-wide configuration, read from the environment exactly once at
/// startup and passed by reference to every component that needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Static shared secret expected in the `x-api-key` request header.
    pub api_key: String,
    pub openai_api_key: String,
    /// Base URL for the OpenAI-compatible API (chat + embeddings).
    pub openai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Folder in the external file store to poll; empty disables the poller.
    pub drive_folder_id: String,
    /// Bearer token for the file-store API. Credential acquisition/refresh
    /// is outside this service.
    pub drive_token: String,
    pub drive_base_url: String,
    pub poll_interval_secs: u64,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        let config = AppConfig {
            port: parsed_env("PORT", 5000),
            api_key: env::var("X_API_KEY").unwrap_or_else(|_| "changeme".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            chunk_size: parsed_env("CHUNK_SIZE", 1000),
            chunk_overlap: parsed_env("CHUNK_OVERLAP", 200),
            drive_folder_id: env::var("GOOGLE_FOLDER_ID").unwrap_or_default(),
            drive_token: env::var("GOOGLE_DRIVE_TOKEN").unwrap_or_default(),
            drive_base_url: env::var("GOOGLE_DRIVE_BASE_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string()),
            poll_interval_secs: parsed_env("POLL_INTERVAL_SECONDS", 60),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations under which the chunker's window would never
    /// advance (non-termination guard).
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.chunk_size == 0 {
            return Err(ApiError::Config("CHUNK_SIZE must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ApiError::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn chat_db_path(&self) -> PathBuf {
        self.data_dir.join("chat.db")
    }

    pub fn index_db_path(&self) -> PathBuf {
        self.data_dir.join("index.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Parses an environment variable straight into its target type; anything
/// out of range for that type falls back to the default instead of being
/// truncated by a cast.
fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
