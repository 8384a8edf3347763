use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Column, Row, SqlitePool};

use crate::errors::ApiError;

/// One ranked chunk from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub content: String,
    pub metadata: Value,
    /// Cosine similarity to the query vector; higher = closer.
    pub similarity: f32,
}

/// One per-file metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub created_at: String,
    /// Column names for tabular sources, absent for chunked text.
    pub schema: Option<Vec<String>>,
}

pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::storage)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_metadata (
                id TEXT PRIMARY KEY,
                title TEXT,
                url TEXT,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                schema TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                file_title TEXT NOT NULL DEFAULT '',
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_doc ON document_chunks(doc_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dataset_id TEXT NOT NULL REFERENCES document_metadata(id),
                row_data TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rows_dataset ON document_rows(dataset_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// True when every key/value pair of `filter` appears in `metadata`.
    fn metadata_contains(metadata: &Value, filter: &Value) -> bool {
        match filter.as_object() {
            None => true,
            Some(pairs) => pairs
                .iter()
                .all(|(key, value)| metadata.get(key) == Some(value)),
        }
    }

    /// Writes the metadata row for a file without touching indexed content.
    /// Title and url are refreshed on every pass; `created_at` and `schema`
    /// keep their existing values.
    pub async fn upsert_metadata(
        &self,
        doc_id: &str,
        title: &str,
        url: Option<&str>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO document_metadata (id, title, url)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET title = excluded.title, url = excluded.url",
        )
        .bind(doc_id)
        .bind(title)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;
        Ok(())
    }

    /// Replaces all indexed state for `doc_id` with the given chunks, in one
    /// transaction: previous chunks and tabular rows are deleted, metadata is
    /// upserted, and the new chunks get a dense 0-based `chunk_index`. A
    /// failure anywhere rolls the whole file back.
    pub async fn upsert_file_chunks(
        &self,
        doc_id: &str,
        title: &str,
        url: Option<&str>,
        chunks: &[(String, Vec<f32>)],
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::storage)?;

        sqlx::query("DELETE FROM document_chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;

        sqlx::query("DELETE FROM document_rows WHERE dataset_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;

        sqlx::query(
            "INSERT INTO document_metadata (id, title, url)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET title = excluded.title, url = excluded.url",
        )
        .bind(doc_id)
        .bind(title)
        .bind(url)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::storage)?;

        for (index, (content, embedding)) in chunks.iter().enumerate() {
            let blob = Self::serialize_embedding(embedding);
            sqlx::query(
                "INSERT INTO document_chunks (doc_id, file_title, chunk_index, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(doc_id)
            .bind(title)
            .bind(index as i64)
            .bind(content)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;
        }

        tx.commit().await.map_err(ApiError::storage)?;
        Ok(())
    }

    /// Replace-all analogue of `upsert_file_chunks` for tabular sources;
    /// also records the discovered column-name schema.
    pub async fn upsert_file_rows(
        &self,
        doc_id: &str,
        title: &str,
        url: Option<&str>,
        rows: &[Map<String, Value>],
        schema: &[String],
    ) -> Result<(), ApiError> {
        let schema_json = serde_json::to_string(schema).map_err(ApiError::internal)?;

        let mut tx = self.pool.begin().await.map_err(ApiError::storage)?;

        sqlx::query("DELETE FROM document_chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;

        sqlx::query("DELETE FROM document_rows WHERE dataset_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;

        sqlx::query(
            "INSERT INTO document_metadata (id, title, url, schema)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                 title = excluded.title,
                 url = excluded.url,
                 schema = excluded.schema",
        )
        .bind(doc_id)
        .bind(title)
        .bind(url)
        .bind(&schema_json)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::storage)?;

        for row in rows {
            let row_json = serde_json::to_string(row).map_err(ApiError::internal)?;
            sqlx::query("INSERT INTO document_rows (dataset_id, row_data) VALUES (?1, ?2)")
                .bind(doc_id)
                .bind(&row_json)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::storage)?;
        }

        tx.commit().await.map_err(ApiError::storage)?;
        Ok(())
    }

    /// Removes all indexed chunks and tabular rows for `doc_id`, leaving its
    /// metadata row in place. Used when a re-ingested file no longer carries
    /// indexable content.
    pub async fn clear_contents(&self, doc_id: &str) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::storage)?;

        sqlx::query("DELETE FROM document_chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;

        sqlx::query("DELETE FROM document_rows WHERE dataset_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;

        tx.commit().await.map_err(ApiError::storage)?;
        Ok(())
    }

    /// Up to `k` chunks ranked by descending cosine similarity to the query
    /// vector, restricted to chunks whose metadata is a superset of `filter`.
    pub async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &Value,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, doc_id, file_title, chunk_index, content, embedding FROM document_chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let metadata = json!({
                    "doc_id": row.get::<String, _>("doc_id"),
                    "file_title": row.get::<String, _>("file_title"),
                    "chunk_index": row.get::<i64, _>("chunk_index"),
                });
                if !Self::metadata_contains(&metadata, filter) {
                    return None;
                }

                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                Some(SearchHit {
                    id: row.get("id"),
                    content: row.get("content"),
                    metadata,
                    similarity: Self::cosine_similarity(query, &stored),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// All document metadata, most-recently-created first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, title, url, created_at, schema
             FROM document_metadata
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(rows
            .iter()
            .map(|row| {
                let schema: Option<String> = row.get("schema");
                DocumentInfo {
                    id: row.get("id"),
                    title: row.get("title"),
                    url: row.get("url"),
                    created_at: row.get("created_at"),
                    schema: schema.and_then(|s| serde_json::from_str(&s).ok()),
                }
            })
            .collect())
    }

    /// All chunk contents for a document, space-joined in chunk order.
    /// Returns an empty string when the document has no chunks.
    pub async fn merged_contents(&self, doc_id: &str) -> Result<String, ApiError> {
        let rows = sqlx::query(
            "SELECT content FROM document_chunks WHERE doc_id = ?1 ORDER BY chunk_index ASC",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("content"))
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Runs a caller-supplied read-only query against the tabular-rows
    /// table. The safelist is textual, not a SQL parser: a single statement,
    /// starting with SELECT, referencing `document_rows` by name.
    pub async fn query_rows(&self, raw_select: &str) -> Result<Vec<Value>, ApiError> {
        let sql = ensure_safe_select(raw_select)?;

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ApiError::BadRequest(format!("query failed: {}", e)))?;

        Ok(rows.iter().map(row_to_json).collect())
    }

    pub async fn chunk_count(&self, doc_id: &str) -> Result<i64, ApiError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE doc_id = ?1")
                .bind(doc_id)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::storage)?;
        Ok(count)
    }

    pub async fn row_count(&self, doc_id: &str) -> Result<i64, ApiError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_rows WHERE dataset_id = ?1")
                .bind(doc_id)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::storage)?;
        Ok(count)
    }
}

/// Textual safelist for ad-hoc tabular queries. Deliberately narrow and kept
/// at the original strictness: trimmed input, one optional trailing
/// semicolon, no embedded statement separator, case-insensitive SELECT
/// prefix, and the rows table referenced by name.
fn ensure_safe_select(raw: &str) -> Result<String, ApiError> {
    let sql = raw.trim().trim_end_matches(';').trim();
    if sql.is_empty() {
        return Err(ApiError::UnsafeQuery("empty query".to_string()));
    }
    if sql.contains(';') {
        return Err(ApiError::UnsafeQuery(
            "only a single statement is allowed".to_string(),
        ));
    }
    let lowered = sql.to_lowercase();
    if !lowered.starts_with("select") {
        return Err(ApiError::UnsafeQuery(
            "only SELECT queries are allowed".to_string(),
        ));
    }
    if !lowered.contains("document_rows") {
        return Err(ApiError::UnsafeQuery(
            "query must target document_rows".to_string(),
        ));
    }
    Ok(sql.to_string())
}

/// Converts an arbitrary result row into a JSON object keyed by column
/// name, probing the handful of types SQLite can hand back.
fn row_to_json(row: &SqliteRow) -> Value {
    let mut object = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        object.insert(column.name().to_string(), value);
    }
    Value::Object(object)
}
