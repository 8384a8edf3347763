use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::ApiError;

/// One item discovered in the external file store.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "webViewLink")]
    pub web_view_link: Option<String>,
}

/// File-store collaborator: flat folder listing, raw download, and
/// export-as-mime-type. The production implementation talks to a
/// Drive-v3-shaped REST API with a bearer token from configuration.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn list_files(&self, folder_id: &str) -> Result<Vec<SourceFile>, ApiError>;
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, ApiError>;
    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    token: String,
}

impl DriveClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            client,
            base_url: config.drive_base_url.trim_end_matches('/').to_string(),
            token: config.drive_token.clone(),
        })
    }

    async fn get_bytes(&self, url: String, query: &[(&str, &str)]) -> Result<Vec<u8>, ApiError> {
        let res = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::upstream(502, e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::upstream(status.as_u16(), text));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| ApiError::upstream(502, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FileStore for DriveClient {
    /// Single flat listing of the folder's direct, non-folder children.
    async fn list_files(&self, folder_id: &str) -> Result<Vec<SourceFile>, ApiError> {
        let query = format!(
            "'{}' in parents and mimeType != 'application/vnd.google-apps.folder'",
            folder_id
        );
        let url = format!("{}/files", self.base_url);

        let res = self
            .client
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id,name,mimeType,webViewLink)"),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
            ])
            .bearer_auth(&self.token)
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

        let files = payload
            .get("files")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::from_value(files).map_err(ApiError::internal)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        self.get_bytes(url, &[("alt", "media")]).await
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/files/{}/export", self.base_url, file_id);
        self.get_bytes(url, &[("mimeType", mime_type)]).await
    }
}
