//! teamscout - sports team data acquisition and enrichment system.
//!
//! Scrapes professional league team directories and runs a pipeline of
//! pluggable enrichers that augment each team record with geographic,
//! social, sponsorship, valuation, and brand-alignment data.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teamscout::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "teamscout=info"
    } else {
        "teamscout=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
