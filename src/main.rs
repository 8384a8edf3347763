mod agent;
mod chunking;
mod config;
mod embeddings;
mod errors;
mod history;
mod ingestion;
mod llm;
mod logging;
mod security;
mod server;
mod state;
mod store;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::ingestion::drive::DriveClient;
use crate::ingestion::extract::ExportExtractor;
use crate::ingestion::pipeline::IngestionPipeline;
use crate::ingestion::poller::Poller;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    logging::init(&config);

    let state = AppState::initialize(config).await?;

    if state.config.drive_folder_id.is_empty() {
        tracing::info!("GOOGLE_FOLDER_ID not set, ingestion poller disabled");
    } else {
        let files = Arc::new(DriveClient::new(&state.config)?);
        let pipeline = IngestionPipeline::new(
            files.clone(),
            Arc::new(ExportExtractor),
            state.embedder.clone(),
            state.index.clone(),
            state.config.chunk_size,
            state.config.chunk_overlap,
        );
        let poller = Poller::new(
            files,
            pipeline,
            state.config.drive_folder_id.clone(),
            Duration::from_secs(state.config.poll_interval_secs),
        );
        tokio::spawn(async move {
            poller.run(false).await;
        });
    }

    let app = server::router::build_router(state.clone());
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
