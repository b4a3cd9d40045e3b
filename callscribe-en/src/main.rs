//! callscribe-en - Recording Enrichment Service
//!
//! Ingests telephony call recordings and enriches them with transcripts,
//! summaries, sentiment, and language through a fixed six-step pipeline.
//! Serves the results over HTTP REST.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use callscribe_en::config::Settings;
use callscribe_en::pipeline::{Orchestrator, RecordingProcessor};
use callscribe_en::services::artifacts::ArtifactStore;
use callscribe_en::services::enrichment::{LlmSummarizer, Summarizer};
use callscribe_en::services::stt::{SpeechToText, WhisperSttClient};
use callscribe_en::services::telephony::{RateLimiter, RecordingsApi, TelephonyClient};
use callscribe_en::services::transcripts::TranscriptResolver;
use callscribe_en::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting callscribe-en (Recording Enrichment)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::resolve(None)?;
    std::fs::create_dir_all(&settings.data_dir)?;
    info!("Data folder: {}", settings.data_dir.display());
    info!("Database: {}", settings.db_path.display());

    let db_pool = callscribe_en::db::init_database_pool(&settings.db_path).await?;
    info!("Database connection established");

    let rate_limiter = Arc::new(RateLimiter::new(settings.rate_limit_ms));
    let recordings_api: Arc<dyn RecordingsApi> = Arc::new(
        TelephonyClient::new(
            &settings.telephony_base_url,
            &settings.telephony_token,
            rate_limiter,
        )
        .map_err(|e| anyhow::anyhow!("Telephony client init failed: {}", e))?,
    );

    let stt: Option<Arc<dyn SpeechToText>> = match &settings.stt {
        Some(cfg) => Some(Arc::new(
            WhisperSttClient::new(&cfg.base_url, &cfg.api_key, cfg.model.clone())
                .map_err(|e| anyhow::anyhow!("STT client init failed: {}", e))?,
        )),
        None => None,
    };

    let summarizer: Option<Arc<dyn Summarizer>> = match &settings.enrichment {
        Some(cfg) => Some(Arc::new(
            LlmSummarizer::new(&cfg.base_url, &cfg.api_key, cfg.model.clone())
                .map_err(|e| anyhow::anyhow!("Summarizer init failed: {}", e))?,
        )),
        None => None,
    };

    let processor = RecordingProcessor::new(
        db_pool.clone(),
        Arc::clone(&recordings_api),
        TranscriptResolver::new(stt),
        summarizer,
        ArtifactStore::new(&settings.data_dir),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        db_pool.clone(),
        processor,
        recordings_api,
        settings.worker_permits,
    ));

    let state = AppState::new(db_pool, Arc::clone(&orchestrator), settings.service_type.clone());
    let app = callscribe_en::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    info!("Listening on http://{}", settings.bind_addr);
    info!("Health check: http://{}/health", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(orchestrator))
        .await?;

    Ok(())
}

async fn shutdown_signal(orchestrator: Arc<Orchestrator>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, stopping in-flight work");
    orchestrator.shutdown();
}
