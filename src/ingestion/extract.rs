use serde_json::{Map, Value};

use crate::errors::ApiError;

/// Format-extraction collaborator. Byte-level parsing of rich formats is
/// outside this service; the pipeline only sees extracted text or row
/// mappings through this trait.
pub trait ContentExtractor: Send + Sync {
    fn text_from_pdf(&self, bytes: &[u8]) -> Result<String, ApiError>;
    /// Text exported by the file store (already `text/plain`).
    fn text_from_export(&self, bytes: &[u8]) -> Result<String, ApiError>;
    /// Rows from a `text/csv` export, one JSON object per record keyed by
    /// header column name.
    fn rows_from_csv(&self, bytes: &[u8]) -> Result<Vec<Map<String, Value>>, ApiError>;
}

/// Default extractor for the formats the poller actually requests. PDFs go
/// through a real parser; bytes it cannot parse degrade to a lossy UTF-8
/// decode rather than failing the file.
pub struct ExportExtractor;

impl ContentExtractor for ExportExtractor {
    fn text_from_pdf(&self, bytes: &[u8]) -> Result<String, ApiError> {
        match pdf_extract::extract_text_from_mem(bytes) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(err) => {
                tracing::warn!("pdf extraction failed, falling back to lossy decode: {}", err);
                Ok(String::from_utf8_lossy(bytes).trim().to_string())
            }
        }
    }

    fn text_from_export(&self, bytes: &[u8]) -> Result<String, ApiError> {
        Ok(String::from_utf8_lossy(bytes).to_string())
    }

    fn rows_from_csv(&self, bytes: &[u8]) -> Result<Vec<Map<String, Value>>, ApiError> {
        let text = String::from_utf8_lossy(bytes);
        let mut records = parse_csv(&text);
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let header = records.remove(0);
        let rows = records
            .into_iter()
            .map(|fields| {
                header
                    .iter()
                    .zip(fields)
                    .map(|(name, value)| (name.clone(), Value::String(value)))
                    .collect()
            })
            .collect();
        Ok(rows)
    }
}

/// Minimal CSV reader for file-store exports: comma-separated, double-quote
/// escaping, CRLF or LF records. Not a general-purpose CSV implementation.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut fields));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }

    records
}
