// api-gateway-rs/src/main.rs
// Service entry point: read configuration, construct the shared services
// once, and serve the HTTP surface.

use std::sync::Arc;

use config_rs::Settings;
use feedback::queue_from_settings;
use header_kb::{HeaderRetriever, HeaderStore, HttpEmbeddingClient};
use llm_service::{AiTextDetector, DetectAiText, Disambiguate, Disambiguator, LlmClient, SqlGenerator};

use api_gateway::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env();

    let embedder = Arc::new(HttpEmbeddingClient::new(
        &settings.embedding_api_url,
        &settings.embedding_model,
        settings.llm_timeout_secs,
    ));
    let store = Arc::new(HeaderStore::connect(
        &settings.qdrant_url,
        &settings.qdrant_collection,
        settings.vector_size,
        embedder,
    )?);
    // Retrieval degrades to empty context when the index is unreachable;
    // the gateway still comes up.
    if let Err(e) = store.ensure_collection().await {
        log::warn!("Header index unavailable, retrieval will degrade: {}", e);
    }
    let retriever: Arc<dyn HeaderRetriever> = store;

    let chat_client = LlmClient::chat_from_settings(&settings);
    let disambiguator: Arc<dyn Disambiguate> =
        Arc::new(Disambiguator::new(Arc::new(chat_client)));
    let generator = Arc::new(SqlGenerator::new(
        Arc::new(LlmClient::from_settings(&settings)),
        retriever.clone(),
        settings
            .enable_disambiguation
            .then(|| disambiguator.clone()),
    ));

    let detector: Arc<dyn DetectAiText> = Arc::new(AiTextDetector::new(
        &settings.detector_api_url,
        settings.llm_timeout_secs,
    ));

    let queue = queue_from_settings(&settings).await?;

    let state = AppState {
        generator,
        detector,
        disambiguator,
        retriever,
        queue,
        static_dir: settings.static_dir.clone(),
    };
    let app = build_router(state);

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("API gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
