use axum::http::HeaderMap;

use crate::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Checks the static shared-secret header before any request touches the
/// agent. The secret comes from configuration, not ambient lookup.
pub fn require_api_key(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() || header_value != expected {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
