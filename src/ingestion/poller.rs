use std::sync::Arc;
use std::time::Duration;

use super::drive::FileStore;
use super::pipeline::IngestionPipeline;
use crate::errors::ApiError;

/// Drives the ingestion pipeline over a folder on a fixed interval.
///
/// The poller is one long-lived task and runs each cycle inline, so two
/// cycles can never overlap for its folder; a slow cycle simply delays the
/// next one. Every cycle re-ingests every listed file; idempotence comes
/// from the pipeline's replace-all writes, not from change detection.
pub struct Poller {
    files: Arc<dyn FileStore>,
    pipeline: IngestionPipeline,
    folder_id: String,
    interval: Duration,
}

impl Poller {
    pub fn new(
        files: Arc<dyn FileStore>,
        pipeline: IngestionPipeline,
        folder_id: String,
        interval: Duration,
    ) -> Self {
        Self {
            files,
            pipeline,
            folder_id,
            interval,
        }
    }

    pub async fn run(&self, once: bool) {
        loop {
            match self.run_cycle().await {
                Ok(count) => tracing::info!(files = count, "ingestion cycle complete"),
                Err(err) => tracing::error!("ingestion cycle failed to list folder: {}", err),
            }

            if once {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One pass over the folder. A failure on one file is logged and the
    /// pass continues; only a listing failure aborts the cycle.
    async fn run_cycle(&self) -> Result<usize, ApiError> {
        let files = self.files.list_files(&self.folder_id).await?;
        tracing::info!(files = files.len(), folder = %self.folder_id, "listed source folder");

        for file in &files {
            if let Err(err) = self.pipeline.ingest(file).await {
                tracing::warn!(file_id = %file.id, name = %file.name, "failed to ingest: {}", err);
            }
        }

        Ok(files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::embeddings::EmbeddingClient;
    use crate::ingestion::drive::SourceFile;
    use crate::ingestion::extract::ExportExtractor;
    use crate::store::IndexStore;

    /// Listing succeeds; downloads fail for ids in `broken`.
    struct FlakyStore {
        files: Vec<SourceFile>,
        broken: Vec<String>,
    }

    #[async_trait]
    impl FileStore for FlakyStore {
        async fn list_files(&self, _folder_id: &str) -> Result<Vec<SourceFile>, ApiError> {
            Ok(self.files.clone())
        }

        async fn download(&self, file_id: &str) -> Result<Vec<u8>, ApiError> {
            self.export(file_id, "").await
        }

        async fn export(&self, file_id: &str, _mime: &str) -> Result<Vec<u8>, ApiError> {
            if self.broken.iter().any(|id| id == file_id) {
                return Err(ApiError::upstream(500, "boom"));
            }
            Ok(b"some exported text".to_vec())
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|_| vec![1.0]).collect())
        }
    }

    fn doc(id: &str) -> SourceFile {
        SourceFile {
            id: id.to_string(),
            name: id.to_string(),
            mime_type: "application/vnd.google-apps.document".to_string(),
            web_view_link: None,
        }
    }

    #[tokio::test]
    async fn one_broken_file_does_not_abort_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(IndexStore::new(dir.path().join("index.db")).await.unwrap());

        let store = Arc::new(FlakyStore {
            files: vec![doc("good"), doc("bad"), doc("also_good")],
            broken: vec!["bad".to_string()],
        });
        let pipeline = IngestionPipeline::new(
            store.clone(),
            Arc::new(ExportExtractor),
            Arc::new(StubEmbedder),
            index.clone(),
            100,
            10,
        );
        let poller = Poller::new(store, pipeline, "folder".to_string(), Duration::from_secs(60));

        poller.run(true).await;

        assert!(index.chunk_count("good").await.unwrap() > 0);
        assert!(index.chunk_count("also_good").await.unwrap() > 0);
        assert_eq!(index.chunk_count("bad").await.unwrap(), 0);
        // The broken file still got its metadata row before the download.
        assert_eq!(index.list_documents().await.unwrap().len(), 3);
    }
}
