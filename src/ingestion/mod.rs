//! Ingestion side: folder polling, per-file processing, and the external
//! file-store and format-extraction boundaries.

pub mod drive;
pub mod extract;
pub mod pipeline;
pub mod poller;
