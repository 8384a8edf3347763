//! Index store: document chunks with embeddings, per-file metadata, and
//! tabular rows, all in one SQLite database.

mod index;

pub use index::{DocumentInfo, IndexStore, SearchHit};
