//! S3 Uploader
//!
//! Uploads the source folders of a data product to an S3 bucket.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use s3_uploader::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting S3 Uploader v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let summary = cli::run(cli).await?;

    if !summary.is_complete_success() {
        tracing::warn!("{} of {} files were not uploaded", summary.total_failed, summary.total_attempted);
    }

    Ok(())
}
