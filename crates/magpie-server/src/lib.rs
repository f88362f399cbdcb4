//! HTTP service for the magpie archiver.
//!
//! Exposes health, the in-flight queue (listing and submission), URL and
//! source browsing, and shutdown. When basic-auth credentials are
//! configured, everything except the health check requires them.

mod auth;
mod handlers;
mod routes;

pub use auth::AuthConfig;
pub use routes::create_router;

use std::net::SocketAddr;
use std::time::Instant;

use magpie::config::Settings;
use magpie::repository::Repositories;
use magpie_crawl::Scheduler;
use tokio::sync::watch;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub scheduler: Scheduler,
    /// Writing `true` here terminates the process gracefully.
    pub stop: watch::Sender<bool>,
    pub auth: auth::AuthConfig,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        scheduler: Scheduler,
        stop: watch::Sender<bool>,
        settings: &Settings,
    ) -> Self {
        Self {
            repos,
            scheduler,
            stop,
            auth: auth::AuthConfig::from_settings(settings),
            started: Instant::now(),
        }
    }
}

/// Bind and serve until the stop channel fires.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let mut stop_rx = state.stop.subscribe();
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = stop_rx.changed().await;
        })
        .await?;

    Ok(())
}
