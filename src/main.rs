//! QnA bot - chat front-end for a hosted question-answering service
//!
//! Receives channel activities over HTTP, ranks knowledge base answers by
//! confidence, and replies with an answer, follow-up prompts or
//! "did you mean" suggestions.

mod activity;
mod api;
mod auth;
mod cards;
mod config;
mod db;
mod dialog;
mod format;
mod qna;
mod runtime;

use api::{create_router, AppState};
use config::BotConfig;
use db::Database;
use qna::{HttpQnaService, LoggingQnaService};
use runtime::{DatabaseStorage, ProductionRunner};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qna_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    // A crash mid-turn can leave an in-flight state behind
    let discarded = db.discard_unsettled_states()?;
    let purged = db.purge_expired_prompts(chrono::Utc::now())?;
    if discarded > 0 || purged > 0 {
        tracing::info!(discarded, purged, "Cleaned up stale conversation state");
    }

    if config.has_knowledge_base() {
        tracing::info!(
            host = %config.endpoint.host,
            kb = %config.endpoint.knowledge_base_id,
            auth = config.auth.enabled,
            "Knowledge base configured"
        );
    } else {
        tracing::warn!("No knowledge base configured. Set QNA_KNOWLEDGEBASE_ID and QNA_AUTH_KEY.");
    }

    let qna = LoggingQnaService::new(HttpQnaService::new(
        config.endpoint.clone(),
        config.query_options.clone(),
    )?);
    let runner: ProductionRunner = runtime::TurnRunner::new(&config, DatabaseStorage::new(db), qna);
    let state = AppState::new(Arc::new(runner));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("QnA bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
