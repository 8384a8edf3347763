use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::drive::{FileStore, SourceFile};
use super::extract::ContentExtractor;
use crate::chunking::chunk_text;
use crate::embeddings::EmbeddingClient;
use crate::errors::ApiError;
use crate::store::IndexStore;

const MIME_PDF: &str = "application/pdf";
const MIME_GOOGLE_DOC: &str = "application/vnd.google-apps.document";
const MIME_GOOGLE_SHEET: &str = "application/vnd.google-apps.spreadsheet";

/// Rows sampled when deriving a tabular schema.
const SCHEMA_SAMPLE_ROWS: usize = 50;

/// Per-file ingestion: extract, chunk, embed, and replace the file's
/// indexed state. Re-running over unchanged content is a no-op in effect;
/// the store's replace-all semantics carry idempotence.
pub struct IngestionPipeline {
    files: Arc<dyn FileStore>,
    extractor: Arc<dyn ContentExtractor>,
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<IndexStore>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IngestionPipeline {
    pub fn new(
        files: Arc<dyn FileStore>,
        extractor: Arc<dyn ContentExtractor>,
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<IndexStore>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            files,
            extractor,
            embedder,
            index,
            chunk_size,
            chunk_overlap,
        }
    }

    pub async fn ingest(&self, file: &SourceFile) -> Result<(), ApiError> {
        // Every discovered file gets a metadata row, supported or not.
        self.index
            .upsert_metadata(&file.id, &file.name, file.web_view_link.as_deref())
            .await?;

        match file.mime_type.as_str() {
            MIME_PDF => {
                let bytes = self.files.download(&file.id).await?;
                let text = self.extractor.text_from_pdf(&bytes)?;
                self.index_text(file, &text).await
            }
            MIME_GOOGLE_DOC => {
                let bytes = self.files.export(&file.id, "text/plain").await?;
                let text = self.extractor.text_from_export(&bytes)?;
                self.index_text(file, &text).await
            }
            MIME_GOOGLE_SHEET => {
                let bytes = self.files.export(&file.id, "text/csv").await?;
                let rows = self.extractor.rows_from_csv(&bytes)?;
                self.index_rows(file, rows).await
            }
            other => {
                tracing::debug!(file_id = %file.id, mime = other, "skipping unsupported type");
                // A file that stops being indexable must not keep stale
                // content from an earlier pass.
                self.index.clear_contents(&file.id).await
            }
        }
    }

    async fn index_text(&self, file: &SourceFile, text: &str) -> Result<(), ApiError> {
        let chunks = chunk_text(text, self.chunk_size, self.chunk_overlap)?;

        // No chunks means no embedding call at all.
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed(&chunks).await?
        };

        if embeddings.len() != chunks.len() {
            return Err(ApiError::Embedding(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }

        let pairs: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(embeddings).collect();
        self.index
            .upsert_file_chunks(&file.id, &file.name, file.web_view_link.as_deref(), &pairs)
            .await?;

        tracing::info!(file_id = %file.id, chunks = pairs.len(), "indexed text file");
        Ok(())
    }

    async fn index_rows(
        &self,
        file: &SourceFile,
        rows: Vec<Map<String, Value>>,
    ) -> Result<(), ApiError> {
        if rows.is_empty() {
            return self.index.clear_contents(&file.id).await;
        }

        let schema = derive_schema(&rows);
        self.index
            .upsert_file_rows(
                &file.id,
                &file.name,
                file.web_view_link.as_deref(),
                &rows,
                &schema,
            )
            .await?;

        tracing::info!(file_id = %file.id, rows = rows.len(), "indexed tabular file");
        Ok(())
    }
}

/// Sorted union of the column names seen across the first
/// `SCHEMA_SAMPLE_ROWS` rows.
pub fn derive_schema(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for row in rows.iter().take(SCHEMA_SAMPLE_ROWS) {
        for key in row.keys() {
            keys.insert(key.clone());
        }
    }
    keys.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::ingestion::extract::ExportExtractor;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn schema_is_the_sorted_union_of_keys() {
        let rows = vec![
            row(&[("a", json!(1)), ("b", json!(2))]),
            row(&[("a", json!(3)), ("c", json!(4))]),
        ];
        assert_eq!(derive_schema(&rows), vec!["a", "b", "c"]);
    }

    #[test]
    fn schema_sampling_stops_at_fifty_rows() {
        let mut rows: Vec<Map<String, Value>> =
            (0..60).map(|_| row(&[("seen", json!(1))])).collect();
        rows[55] = row(&[("late", json!(1))]);
        assert_eq!(derive_schema(&rows), vec!["seen"]);
    }

    /// In-memory file store serving canned bytes.
    struct FixtureStore {
        files: Vec<SourceFile>,
        payload: Vec<u8>,
    }

    #[async_trait]
    impl FileStore for FixtureStore {
        async fn list_files(&self, _folder_id: &str) -> Result<Vec<SourceFile>, ApiError> {
            Ok(self.files.clone())
        }

        async fn download(&self, _file_id: &str) -> Result<Vec<u8>, ApiError> {
            Ok(self.payload.clone())
        }

        async fn export(&self, _file_id: &str, _mime: &str) -> Result<Vec<u8>, ApiError> {
            Ok(self.payload.clone())
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(inputs.iter().map(|_| vec![0.5, 0.5]).collect())
        }
    }

    fn source(id: &str, mime: &str) -> SourceFile {
        SourceFile {
            id: id.to_string(),
            name: format!("{} file", id),
            mime_type: mime.to_string(),
            web_view_link: None,
        }
    }

    fn pipeline_over(index: Arc<IndexStore>, payload: &[u8]) -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::new(FixtureStore {
                files: Vec::new(),
                payload: payload.to_vec(),
            }),
            Arc::new(ExportExtractor),
            Arc::new(StubEmbedder),
            index,
            10,
            2,
        )
    }

    async fn pipeline_with_payload(
        dir: &tempfile::TempDir,
        payload: &[u8],
    ) -> (IngestionPipeline, Arc<IndexStore>) {
        let index = Arc::new(IndexStore::new(dir.path().join("index.db")).await.unwrap());
        (pipeline_over(index.clone(), payload), index)
    }

    #[tokio::test]
    async fn document_export_is_chunked_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) =
            pipeline_with_payload(&dir, b"a text that spans multiple chunk windows").await;

        pipeline
            .ingest(&source("doc1", MIME_GOOGLE_DOC))
            .await
            .unwrap();

        assert!(index.chunk_count("doc1").await.unwrap() > 1);
        assert_eq!(
            index
                .merged_contents("doc1")
                .await
                .unwrap()
                .contains("chunk windows"),
            true
        );
    }

    #[tokio::test]
    async fn spreadsheet_export_becomes_rows_with_schema() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) = pipeline_with_payload(&dir, b"b,a\n1,2\n3,4\n").await;

        pipeline
            .ingest(&source("sheet1", MIME_GOOGLE_SHEET))
            .await
            .unwrap();

        assert_eq!(index.row_count("sheet1").await.unwrap(), 2);
        let docs = index.list_documents().await.unwrap();
        assert_eq!(docs[0].schema.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
    }

    #[tokio::test]
    async fn unsupported_type_still_gets_a_metadata_row() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) = pipeline_with_payload(&dir, b"whatever").await;

        pipeline
            .ingest(&source("img1", "image/png"))
            .await
            .unwrap();

        assert_eq!(index.chunk_count("img1").await.unwrap(), 0);
        assert_eq!(index.row_count("img1").await.unwrap(), 0);
        let docs = index.list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "img1");
    }

    #[tokio::test]
    async fn emptied_spreadsheet_drops_its_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(IndexStore::new(dir.path().join("index.db")).await.unwrap());

        pipeline_over(index.clone(), b"a,b\n1,2\n")
            .ingest(&source("sheet1", MIME_GOOGLE_SHEET))
            .await
            .unwrap();
        assert_eq!(index.row_count("sheet1").await.unwrap(), 1);

        // Same sheet comes back header-only on the next pass.
        pipeline_over(index.clone(), b"a,b\n")
            .ingest(&source("sheet1", MIME_GOOGLE_SHEET))
            .await
            .unwrap();
        assert_eq!(index.row_count("sheet1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn file_turning_unsupported_drops_its_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(IndexStore::new(dir.path().join("index.db")).await.unwrap());

        pipeline_over(index.clone(), b"some document text to index")
            .ingest(&source("doc1", MIME_GOOGLE_DOC))
            .await
            .unwrap();
        assert!(index.chunk_count("doc1").await.unwrap() > 0);

        pipeline_over(index.clone(), b"whatever")
            .ingest(&source("doc1", "image/png"))
            .await
            .unwrap();
        assert_eq!(index.chunk_count("doc1").await.unwrap(), 0);
        assert_eq!(index.list_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_document_indexes_zero_chunks_without_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, index) = pipeline_with_payload(&dir, b"").await;

        pipeline
            .ingest(&source("empty1", MIME_GOOGLE_DOC))
            .await
            .unwrap();

        assert_eq!(index.chunk_count("empty1").await.unwrap(), 0);
        assert_eq!(index.list_documents().await.unwrap().len(), 1);
    }
}
