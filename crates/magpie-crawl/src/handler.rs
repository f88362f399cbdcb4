//! HTTP response handling: record updates, snapshots, link discovery,
//! and body storage.
//!
//! The handler consumes [`Fetched`] values, so everything here is testable
//! without a network. Within one GET, the snapshot append, the link
//! upserts, and the blob PUT run as concurrent sub-tasks joined by a
//! barrier; the first store error short-circuits the joined result, while
//! blob-store failures are logged and never block record updates.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use magpie::models::{Link, Snapshot, Url};
use magpie::repository::Repositories;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::client::Fetched;
use crate::content::ContentPipeline;
use crate::error::CrawlError;
use crate::normalize::{host_of, normalize};
use crate::{freshness, sniff};

/// What the scheduler should do after a HEAD response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadOutcome {
    /// Promote to a GET on the crawl queue (HTML on a crawl host).
    pub crawl_get: bool,
    /// Promote to a GET on the content queue (discovered file URL).
    pub content_get: bool,
}

/// What a GET produced: the links observed in the document.
#[derive(Debug, Default)]
pub struct GetOutcome {
    pub links: Vec<Link>,
}

/// Applies responses to the store, the snapshot log, and the blob store.
#[derive(Clone)]
pub struct ResponseHandler {
    repos: Repositories,
    content: ContentPipeline,
    stale: Duration,
}

impl ResponseHandler {
    pub fn new(repos: Repositories, content: ContentPipeline, stale: Duration) -> Self {
        Self {
            repos,
            content,
            stale,
        }
    }

    /// HEAD role: refresh header-derived fields and report whether the
    /// URL should be promoted to a GET.
    pub async fn handle_head(
        &self,
        fetched: &Fetched,
        is_crawl_host: bool,
        now: DateTime<Utc>,
    ) -> Result<HeadOutcome, CrawlError> {
        let Some(mut record) = self.repos.urls.get(&fetched.url).await? else {
            // Not an error: the record may have raced away, or the head
            // was issued for a URL nobody tracked. Nothing to update.
            debug!("head response for unknown url {}", fetched.url);
            return Ok(HeadOutcome::default());
        };

        record.apply_head(
            fetched.status,
            fetched.content_type(),
            fetched.content_length(),
            fetched.headers.clone(),
            now,
        );
        self.repos.urls.save(&record).await?;

        let get_due = freshness::should_enqueue_get(&record, self.stale, now);
        let declared_html = sniff::is_html_like(&record.content_type);
        Ok(HeadOutcome {
            crawl_get: get_due && declared_html && is_crawl_host,
            content_get: get_due && !declared_html && sniff::file_name_for(&record.url).is_some(),
        })
    }

    /// GET role: hash and sniff the body, update the record, append a
    /// snapshot, extract links, and store the body when eligible.
    pub async fn handle_get(
        &self,
        fetched: &Fetched,
        now: DateTime<Utc>,
    ) -> Result<GetOutcome, CrawlError> {
        let body = fetched.body.as_deref().unwrap_or(&[]);
        let content_sniff = sniff::sniff(body);
        let hash = self.content.fingerprint(body);

        let (title, destinations) = if sniff::is_html_like(&content_sniff) {
            extract_links(body, &fetched.url)
        } else {
            (None, Vec::new())
        };

        let storable = !body.is_empty() && self.content.should_store(&content_sniff, &fetched.url);
        let file_name = if storable {
            sniff::file_name_for(&fetched.url)
        } else {
            None
        };

        let mut record = match self.repos.urls.get(&fetched.url).await? {
            Some(record) => record,
            // First sight of this URL; create the record before completing
            None => {
                self.repos
                    .urls
                    .create_if_missing(&Url::new(fetched.url.clone(), host_of(&fetched.url)))
                    .await?
            }
        };
        record.apply_get(
            fetched.status,
            fetched.content_type(),
            content_sniff,
            body.len() as i64,
            fetched.headers.clone(),
            hash.clone(),
            title,
            file_name,
            now,
        );
        self.repos.urls.save(&record).await?;

        let snapshot = Snapshot::new(
            record.url.clone(),
            now,
            fetched.status,
            fetched.duration.as_millis() as i64,
            fetched.headers.clone(),
            hash.clone(),
        );

        let snapshot_task = async {
            self.repos
                .snapshots
                .append(&snapshot)
                .await
                .map_err(CrawlError::from)
        };
        let links_task = self.record_links(&record.url, &destinations, now);
        let blob_task = async {
            if storable {
                if let Err(e) = self.content.store(&record.url, &hash, body).await {
                    warn!("blob store failed for {}: {}", record.url, e);
                }
            }
            Ok::<(), CrawlError>(())
        };

        let ((), links, ()) = tokio::try_join!(snapshot_task, links_task, blob_task)?;
        Ok(GetOutcome { links })
    }

    /// Upsert a URL record and a link edge for every destination.
    async fn record_links(
        &self,
        src: &str,
        destinations: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<Link>, CrawlError> {
        let mut observed = Vec::with_capacity(destinations.len());
        for dst in destinations {
            self.repos
                .urls
                .create_if_missing(&Url::new(dst.clone(), host_of(dst)))
                .await?;
            let link = Link::new(src.to_string(), dst.clone(), now);
            self.repos.links.save(&link).await?;
            observed.push(link);
        }
        Ok(observed)
    }
}

/// Parse an HTML body: the `<title>` text and every `[href]` destination,
/// resolved against `base`, normalized, filtered to fetchable URLs, and
/// deduplicated. A body that fails to parse as meaningful HTML simply
/// yields nothing.
fn extract_links(body: &[u8], base: &str) -> (Option<String>, Vec<String>) {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.inner_html().trim().to_string())
        .filter(|t| !t.is_empty());

    let base_url = match url::Url::parse(base) {
        Ok(u) => u,
        Err(e) => {
            warn!("unresolvable base url {}: {}", base, e);
            return (title, Vec::new());
        }
    };

    let href_selector = Selector::parse("[href]").unwrap();
    let mut seen = HashSet::new();
    let mut destinations = Vec::new();
    for element in document.select(&href_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(resolved) = base_url.join(href) else {
            debug!("skipping unresolvable href {:?} on {}", href, base);
            continue;
        };
        let Ok(normalized) = normalize(resolved.as_str()) else {
            continue;
        };
        if !freshness::is_fetchable(&normalized) {
            continue;
        }
        if seen.insert(normalized.clone()) {
            destinations.push(normalized);
        }
    }

    (title, destinations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie::hash::multihash_hex;
    use magpie::models::now_secs;
    use magpie::repository::{AsyncSqlitePool, Repositories};
    use magpie::storage::MemoryBlobStore;
    use std::sync::Arc;

    use crate::client::Method;

    const STALE: Duration = Duration::from_secs(72 * 3600);

    async fn setup() -> (ResponseHandler, Repositories, MemoryBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repos = Repositories::new(AsyncSqlitePool::from_path(&dir.path().join("test.db")));
        repos.init_schema().await.unwrap();
        let blob = MemoryBlobStore::new();
        let pipeline =
            ContentPipeline::new(Arc::new(blob.clone()), "content".to_string(), Vec::new());
        let handler = ResponseHandler::new(repos.clone(), pipeline, STALE);
        (handler, repos, blob, dir)
    }

    fn get_response(url: &str, body: &[u8], content_type: &str) -> Fetched {
        Fetched {
            url: url.to_string(),
            method: Method::Get,
            status: 200,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: Some(body.to_vec()),
            duration: Duration::from_millis(12),
        }
    }

    fn head_response(url: &str, content_type: &str) -> Fetched {
        Fetched {
            url: url.to_string(),
            method: Method::Head,
            status: 200,
            headers: vec![
                ("content-type".to_string(), content_type.to_string()),
                ("content-length".to_string(), "512".to_string()),
            ],
            body: None,
            duration: Duration::from_millis(3),
        }
    }

    #[tokio::test]
    async fn get_of_html_page_records_everything() {
        let (handler, repos, blob, _dir) = setup().await;
        let body = br#"<html><title>T</title><a href="/b.pdf">x</a><a href="/b.pdf">again</a></html>"#;
        let fetched = get_response("http://example.com/a.html", body, "text/html");

        let outcome = handler.handle_get(&fetched, now_secs()).await.unwrap();

        // Link extraction: deduplicated at set level
        assert_eq!(outcome.links.len(), 1);
        assert_eq!(outcome.links[0].dst, "http://example.com/b.pdf");

        let record = repos.urls.get("http://example.com/a.html").await.unwrap().unwrap();
        assert_eq!(record.title, "T");
        assert_eq!(record.status, 200);
        assert_eq!(record.content_sniff, "text/html; charset=utf-8");
        assert_eq!(record.content_length, body.len() as i64);
        assert_eq!(record.hash, multihash_hex(body));
        assert!(record.is_fetched());

        // Destination record and link edge exist
        assert!(repos.urls.get("http://example.com/b.pdf").await.unwrap().is_some());
        assert!(repos
            .links
            .get("http://example.com/a.html", "http://example.com/b.pdf")
            .await
            .unwrap()
            .is_some());

        // One snapshot, and the html body stays out of the blob store
        assert_eq!(
            repos.snapshots.count_for_url("http://example.com/a.html").await.unwrap(),
            1
        );
        assert!(blob.is_empty().await);
    }

    #[tokio::test]
    async fn get_of_file_stores_the_body() {
        let (handler, repos, blob, _dir) = setup().await;
        let body = b"%PDF-1.4 pretend pdf";
        let fetched = get_response("http://example.com/b.pdf", body, "application/pdf");

        handler.handle_get(&fetched, now_secs()).await.unwrap();

        let record = repos.urls.get("http://example.com/b.pdf").await.unwrap().unwrap();
        assert_eq!(record.content_sniff, "application/pdf");
        assert_eq!(record.file_name, "b.pdf");

        let key = format!("content/{}", &record.hash["1220".len()..]);
        assert_eq!(blob.get(&key).await.unwrap(), body);
    }

    #[tokio::test]
    async fn repeat_get_appends_snapshots_but_keeps_one_record() {
        let (handler, repos, _blob, _dir) = setup().await;
        let body = b"<html><title>T</title></html>";
        let fetched = get_response("http://example.com/a.html", body, "text/html");

        let t0 = now_secs();
        handler.handle_get(&fetched, t0).await.unwrap();
        handler
            .handle_get(&fetched, t0 + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(
            repos.snapshots.count_for_url("http://example.com/a.html").await.unwrap(),
            2
        );
        let snapshots = repos
            .snapshots
            .list_for_url("http://example.com/a.html")
            .await
            .unwrap();
        assert!(snapshots[0].created < snapshots[1].created);
        assert_eq!(snapshots[0].hash, snapshots[1].hash);
        assert_eq!(repos.urls.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn head_updates_record_and_promotes_html_on_crawl_hosts() {
        let (handler, repos, _blob, _dir) = setup().await;
        let record = Url::new("http://example.com/a.html".into(), "example.com".into());
        repos.urls.save(&record).await.unwrap();

        let fetched = head_response("http://example.com/a.html", "text/html; charset=utf-8");
        let outcome = handler.handle_head(&fetched, true, now_secs()).await.unwrap();
        assert!(outcome.crawl_get);
        assert!(!outcome.content_get);

        let stored = repos.urls.get("http://example.com/a.html").await.unwrap().unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.content_length, 512);
        assert!(stored.last_head.is_some());

        // Same URL off a crawl host: no promotion
        let outcome = handler.handle_head(&fetched, false, now_secs()).await.unwrap();
        assert!(!outcome.crawl_get);
    }

    #[tokio::test]
    async fn head_of_file_url_promotes_to_content_queue() {
        let (handler, repos, _blob, _dir) = setup().await;
        let record = Url::new("http://example.com/b.pdf".into(), "example.com".into());
        repos.urls.save(&record).await.unwrap();

        let fetched = head_response("http://example.com/b.pdf", "application/pdf");
        let outcome = handler.handle_head(&fetched, true, now_secs()).await.unwrap();
        assert!(!outcome.crawl_get);
        assert!(outcome.content_get);
    }

    #[tokio::test]
    async fn head_for_unknown_url_is_silent() {
        let (handler, repos, _blob, _dir) = setup().await;
        let fetched = head_response("http://example.com/ghost", "text/html");
        let outcome = handler.handle_head(&fetched, true, now_secs()).await.unwrap();
        assert_eq!(outcome, HeadOutcome::default());
        assert_eq!(repos.urls.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn head_within_staleness_window_does_not_promote() {
        let (handler, repos, _blob, _dir) = setup().await;
        let mut record = Url::new("http://example.com/a.html".into(), "example.com".into());
        record.last_get = Some(now_secs());
        repos.urls.save(&record).await.unwrap();

        let fetched = head_response("http://example.com/a.html", "text/html");
        let outcome = handler.handle_head(&fetched, true, now_secs()).await.unwrap();
        assert!(!outcome.crawl_get);
    }

    #[tokio::test]
    async fn non_html_links_are_filtered() {
        let (handler, _repos, _blob, _dir) = setup().await;
        let body = br#"<html><a href="mailto:x@y">m</a><a href="ftp://f/">f</a><a href="b.html">ok</a></html>"#;
        let fetched = get_response("http://example.com/a.html", body, "text/html");

        let outcome = handler.handle_get(&fetched, now_secs()).await.unwrap();
        let dsts: Vec<_> = outcome.links.iter().map(|l| l.dst.as_str()).collect();
        assert_eq!(dsts, vec!["http://example.com/b.html"]);
    }

    #[test]
    fn extract_links_resolves_relative_hrefs() {
        let body = br##"<html><head><link rel="stylesheet" href="/style.css"></head>
            <body><a href="../up">u</a><a href="#frag">skip</a></body></html>"##;
        let (title, links) = extract_links(body, "http://example.com/docs/page/");
        assert!(title.is_none());
        assert!(links.contains(&"http://example.com/style.css".to_string()));
        assert!(links.contains(&"http://example.com/docs/up".to_string()));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn garbage_body_yields_no_links() {
        let (title, links) = extract_links(b"not html at all", "http://example.com/");
        assert!(title.is_none());
        assert!(links.is_empty());
    }
}
