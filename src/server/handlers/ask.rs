use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ApiError;
use crate::security::require_api_key;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "sessionId", default = "default_session")]
    pub session_id: String,
}

fn default_session() -> String {
    "default".to_string()
}

pub async fn ask_hint() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "hint": "Use POST with JSON {message, sessionId} and x-api-key header",
    }))
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.config.api_key)?;

    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("no message provided".to_string()));
    }
    if state.config.openai_api_key.is_empty() {
        return Err(ApiError::Config("OPENAI_API_KEY missing".to_string()));
    }

    let answer = state.agent.ask(&payload.session_id, &payload.message).await?;
    Ok(Json(json!({"answer": answer})))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::HeaderValue;

    use crate::config::AppConfig;

    fn test_config(dir: &tempfile::TempDir, openai_key: &str) -> AppConfig {
        AppConfig {
            port: 0,
            api_key: "secret".to_string(),
            openai_api_key: openai_key.to_string(),
            openai_base_url: "http://localhost:1".to_string(),
            chat_model: "m".to_string(),
            embedding_model: "e".to_string(),
            chunk_size: 100,
            chunk_overlap: 20,
            drive_folder_id: String::new(),
            drive_token: String::new(),
            drive_base_url: "http://localhost:1".to_string(),
            poll_interval_secs: 60,
            data_dir: dir.path().to_path_buf(),
        }
    }

    fn headers_with_key(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(key).unwrap());
        headers
    }

    #[tokio::test]
    async fn wrong_shared_secret_is_rejected_before_the_agent() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::initialize(test_config(&dir, "sk")).await.unwrap();

        let result = ask(
            State(state),
            headers_with_key("wrong"),
            Json(AskRequest {
                message: "hi".to_string(),
                session_id: "s".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn empty_message_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::initialize(test_config(&dir, "sk")).await.unwrap();

        let result = ask(
            State(state),
            headers_with_key("secret"),
            Json(AskRequest {
                message: "   ".to_string(),
                session_id: "s".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn missing_model_credential_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::initialize(test_config(&dir, "")).await.unwrap();

        let result = ask(
            State(state),
            headers_with_key("secret"),
            Json(AskRequest {
                message: "hi".to_string(),
                session_id: "s".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Config(_))));
    }
}
