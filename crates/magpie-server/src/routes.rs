//! Router configuration for the web server.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::{auth, handlers, AppState};

/// Create the main router with all routes. Admin routes sit behind the
/// basic-auth gate; the health check stays open for orchestration.
pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/mem", get(handlers::mem_report))
        .route("/que", get(handlers::list_queue).post(handlers::submit_url))
        .route("/shutdown", post(handlers::shutdown))
        .route("/urls", get(handlers::list_urls))
        .route("/sources", get(handlers::list_sources))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::basic_auth,
        ));

    Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .merge(admin)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
