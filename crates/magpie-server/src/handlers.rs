//! Request handlers for the admin surface.

use axum::extract::{Form, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use magpie_crawl::CrawlError;

use super::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// `GET /healthcheck`
pub async fn healthcheck() -> impl IntoResponse {
    Json(json!({ "status": 200 }))
}

/// `GET /mem`: plain-text process and scheduler report.
pub async fn mem_report(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.scheduler.stats();
    let mut report = String::new();
    report.push_str(&format!("uptime_seconds: {}\n", state.started.elapsed().as_secs()));
    report.push_str(&format!("in_flight: {}\n", stats.in_flight));
    report.push_str(&format!("crawl_hosts: {}\n", stats.crawl_hosts));
    report.push_str(&format!("crawl_queue_active: {}\n", stats.crawl_active));
    report.push_str(&format!("content_queue_active: {}\n", stats.content_active));
    report.push_str(&format!("seed_queue_active: {}\n", stats.seed_active));
    if let Some(rss_kb) = rss_kb() {
        report.push_str(&format!("rss_kb: {}\n", rss_kb));
    }
    plain_text(StatusCode::OK, report)
}

/// `GET /que`: the in-flight URL listing.
pub async fn list_queue(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::new();
    for (url, method) in state.scheduler.enqueued_snapshot() {
        body.push_str(&format!("{} {}\n", method.as_str(), url));
    }
    plain_text(StatusCode::OK, body)
}

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    pub url: String,
}

/// `POST /que`: submit a URL for archiving.
pub async fn submit_url(
    State(state): State<AppState>,
    Form(form): Form<SubmitForm>,
) -> Response {
    match state.scheduler.submit(&form.url).await {
        Ok(normalized) => plain_text(StatusCode::OK, format!("queued {}\n", normalized)),
        Err(e) => crawl_error_response(e),
    }
}

/// `POST /shutdown`: terminate the process gracefully.
pub async fn shutdown(State(state): State<AppState>) -> impl IntoResponse {
    info!("shutdown requested over http");
    state.stop.send_replace(true);
    plain_text(StatusCode::OK, "shutting down\n".to_string())
}

#[derive(Debug, Default, Deserialize)]
pub struct UrlsQuery {
    pub fetched: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// `GET /urls`: paginated URL records.
pub async fn list_urls(
    State(state): State<AppState>,
    Query(query): Query<UrlsQuery>,
) -> Response {
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(0).max(0);
    match state
        .repos
        .urls
        .list(query.fetched.unwrap_or(false), per_page, page * per_page)
        .await
    {
        Ok(urls) => Json(urls).into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /sources`: the crawling-source index.
pub async fn list_sources(State(state): State<AppState>) -> Response {
    match state.repos.sources.get_all().await {
        Ok(sources) => Json(sources).into_response(),
        Err(e) => internal_error(e),
    }
}

fn crawl_error_response(e: CrawlError) -> Response {
    if e.is_rejection() {
        plain_text(StatusCode::BAD_REQUEST, format!("{}\n", e))
    } else {
        internal_error(e)
    }
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    plain_text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e))
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Resident set size from procfs, where available.
fn rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    line.split_whitespace().nth(1)?.parse().ok()
}
