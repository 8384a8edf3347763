use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Error surface of the service. Every variant maps to one HTTP status so
/// handlers can return `Result<_, ApiError>` and be done.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsafe query rejected: {0}")]
    UnsafeQuery(String),

    #[error("upstream error ({status}): {detail}")]
    Upstream { status: u16, detail: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Upstream bodies can be huge; only this much survives into the error.
const UPSTREAM_DETAIL_MAX: usize = 400;

impl ApiError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn upstream(status: u16, detail: impl Into<String>) -> Self {
        let detail: String = detail.into();
        let detail = if detail.chars().count() > UPSTREAM_DETAIL_MAX {
            detail.chars().take(UPSTREAM_DETAIL_MAX).collect()
        } else {
            detail
        };
        Self::Upstream { status, detail }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::UnsafeQuery(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } | Self::Embedding(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::Config(_) => "config",
            Self::UnsafeQuery(_) => "unsafe_query",
            Self::Upstream { .. } => "upstream",
            Self::Embedding(_) => "embedding",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }

        let body = Json(json!({
            "error": self.label(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_detail_is_clipped() {
        let long = "x".repeat(10_000);
        match ApiError::upstream(503, long) {
            ApiError::Upstream { status, detail } => {
                assert_eq!(status, 503);
                assert_eq!(detail.chars().count(), UPSTREAM_DETAIL_MAX);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::UnsafeQuery("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Embedding("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Config("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
