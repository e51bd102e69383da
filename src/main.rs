//! PDF Extractor - Entry point
//!
//! HTTP service for PDF text extraction.

use pdf_extractor::{run_server, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Settings may come from a .env file
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        max_file_mb = settings.max_file_mb,
        cors = %settings.cors_allow_origins,
        "Starting {} v{}",
        settings.app_name,
        env!("CARGO_PKG_VERSION")
    );

    run_server(settings).await
}
