use axum::response::IntoResponse;

pub async fn hello() -> impl IntoResponse {
    "Hello from the document Q&A service"
}
