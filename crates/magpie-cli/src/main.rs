//! magpie - a web-archiving crawler.
//!
//! Follows hyperlinks from configured sources, records HTTP responses,
//! stores bodies content-addressed, and keeps a relational view of URLs,
//! links, and per-fetch snapshots.

mod cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present, before anything reads the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "magpie=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
