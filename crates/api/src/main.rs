//! Flower Classifier - Main Entry Point

use api::{init_logging, run_server, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    init_logging(&config.log_level);

    info!("=== Flower Classifier v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Backend: {}, model: {}",
        config.engine.backend.as_str(),
        config.engine.model_path.display()
    );

    run_server(config).await?;

    Ok(())
}
