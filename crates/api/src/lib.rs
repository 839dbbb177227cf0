//! Flower Classifier API Server
//!
//! HTTP front end for the prediction pipeline: multipart upload in, JSON
//! prediction out, with permissive CORS, body limits and optional per-IP
//! rate limiting.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod rate_limit;
pub mod routes;

pub use config::ServerConfig;

use class_index::ClassIndex;
use image_preprocessor::{ImagePreprocessor, PreprocessConfig};
use inference_engine::{load_engine, InferenceError};
use prediction_pipeline::{ClassifyError, PredictionPipeline};
use rate_limit::create_governor_config;

/// Startup failures; any of these stops the process before it listens
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Class mapping error: {0}")]
    ClassIndex(#[from] class_index::ConfigError),
    #[error("Engine error: {0}")]
    Engine(#[from] InferenceError),
    #[error("Pipeline assembly failed: {0}")]
    Pipeline(#[from] ClassifyError),
    #[error("Invalid rate limit: per_second and burst_size must be non-zero")]
    RateLimit,
    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers
pub struct AppState {
    /// The one pipeline serving every request
    pub pipeline: Arc<PredictionPipeline>,
    /// Multipart field carrying the image
    pub upload_field: String,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(pipeline: Arc<PredictionPipeline>, upload_field: impl Into<String>) -> Self {
        Self {
            pipeline,
            upload_field: upload_field.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        }
    }

    /// Expose the given recorder on `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Result<Router, ServerError> {
    let mut predict_routes = Router::new()
        .route(
            "/predict",
            post(routes::predict::predict).fallback(routes::predict::method_not_allowed),
        )
        .route(
            "/api/predict",
            post(routes::predict::predict).fallback(routes::predict::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    if config.rate_limit.enabled {
        let governor = create_governor_config(&config.rate_limit).ok_or(ServerError::RateLimit)?;
        info!(
            "Rate limiting enabled: burst={}, replenish every {}s",
            config.rate_limit.burst_size, config.rate_limit.per_second
        );
        predict_routes = predict_routes.layer(GovernorLayer { config: governor });
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .merge(predict_routes)
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Load the class mapping and engine, and assemble the pipeline
pub fn build_pipeline(config: &ServerConfig) -> Result<PredictionPipeline, ServerError> {
    let classes = ClassIndex::load(&config.class_index_path)?;
    info!(
        "Loaded {} classes from {}",
        classes.len(),
        config.class_index_path.display()
    );

    let engine = load_engine(&config.engine)?;
    let preprocessor = ImagePreprocessor::new(PreprocessConfig::with_size(
        config.engine.input_width,
        config.engine.input_height,
    ));

    Ok(PredictionPipeline::new(preprocessor, engine, Arc::new(classes))?)
}

/// Initialize logging
pub fn init_logging(level: &str) {
    let max_level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !level.eq_ignore_ascii_case(max_level.as_str()) {
        warn!("Unknown log level '{}', using {}", level, max_level);
    }
}

/// Run the server
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let pipeline = build_pipeline(&config).map_err(|e| {
        error!("Startup failed: {}", e);
        e
    })?;

    let handle = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::new(Arc::new(pipeline), config.upload_field.clone()).with_metrics(handle);
    let app = create_router(Arc::new(state), &config)?;

    let addr = config.bind_addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
