pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;

use crate::llm::{ChatLlmService, LlmService};
use crate::models::ModelManager;
use crate::utils::error::DigitError;
use crate::{Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    middleware::from_fn,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub models: Arc<ModelManager>,
    pub llm: Option<Arc<dyn LlmService>>,
}

impl AppState {
    pub fn new(models: ModelManager, llm: Option<Arc<dyn LlmService>>) -> Self {
        Self {
            config: models.config().clone(),
            models: Arc::new(models),
            llm,
        }
    }

    pub fn llm(&self) -> Result<Arc<dyn LlmService>> {
        self.llm.clone().ok_or(DigitError::LlmUnavailable)
    }
}

pub async fn serve(config: Config) -> Result<()> {
    let models = ModelManager::load(config.clone())?;

    let llm: Option<Arc<dyn LlmService>> = match &config.llm {
        Some(llm_config) => Some(Arc::new(ChatLlmService::new(llm_config)?)),
        None => {
            tracing::warn!("LLM endpoint not configured, explanation and chat routes are disabled");
            None
        }
    };

    let app = create_app(AppState::new(models, llm));
    let addr = config.socket_addr()?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Resize policy: {}", config.preprocess.resize_policy);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict, /predict-file   - Multipart upload, raw scores");
    tracing::info!("  POST /predict-base64           - JSON base64 upload, raw scores");
    tracing::info!("  POST /api/mnist/predict        - Multipart upload, top-k");
    tracing::info!("  POST /api/mnist/predict-explain - Top-k with LLM explanation");
    tracing::info!("  POST /api/mnist/quiz           - LLM practice quiz");
    tracing::info!("  POST /api/chat/ask             - LLM question");
    tracing::info!("  POST /api/chat/summary         - LLM chat summary");
    tracing::info!("  GET  /health                   - Health check");
    tracing::info!("  GET  /api/info                 - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        DigitError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DigitError::Internal(format!("Server failed: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = state.config.server_config.clone();

    Router::new()
        .route("/", get(ui::index_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .route("/predict", post(handlers::predict_file_handler))
        .route("/predict-file", post(handlers::predict_file_handler))
        .route("/predict-base64", post(handlers::predict_base64_handler))
        .route("/api/mnist/predict", post(handlers::mnist_predict_handler))
        .route(
            "/api/mnist/predict-explain",
            post(handlers::mnist_predict_explain_handler),
        )
        .route("/api/mnist/quiz", post(handlers::mnist_quiz_handler))
        .route("/api/chat/ask", post(handlers::chat_ask_handler))
        .route("/api/chat/summary", post(handlers::chat_summary_handler))
        .layer(from_fn(middleware::security_headers))
        .layer(from_fn(middleware::request_logging))
        // axum's own 2 MB default would cut uploads short of the configured limit
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let models = Arc::clone(&state.models);
    tokio::task::spawn_blocking(move || models.health_check())
        .await
        .map_err(|e| DigitError::Internal(format!("health check task failed: {}", e)))??;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "llm_configured": state.llm.is_some(),
    })))
}

async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.models.stats();
    Json(json!({
        "service": "ONNX Digit Classification Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "models": stats,
        "features": {
            "multipart_upload": true,
            "base64_upload": true,
            "llm_explanations": state.llm.is_some(),
        }
    }))
}
