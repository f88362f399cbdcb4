//! The crawl scheduler.
//!
//! One `Scheduler` value owns the three fetch queues, the process-wide
//! in-flight set, and the crawl-host set; the HTTP service holds a clone.
//! Responses come back through the [`Responder`] hook on the worker task
//! that fetched them, get handled, and their promotions are routed here:
//! HEAD of HTML on a crawl host promotes to a crawl GET, HEAD of a file
//! URL promotes to a content GET, and links out of GETs fan back in as
//! crawl HEADs when stale.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use magpie::config::Settings;
use magpie::models::{now_secs, Url};
use magpie::repository::Repositories;
use magpie::storage::BlobStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{Fetched, HttpClient, Method};
use crate::content::ContentPipeline;
use crate::error::CrawlError;
use crate::freshness;
use crate::handler::ResponseHandler;
use crate::normalize::{host_of, normalize};
use crate::queue::{FetchQueue, FetchTask, QueueKind, Responder};
use crate::seeder;

/// Mutable state shared by all queues, guarded by one mutex held only
/// for the duration of a map operation.
#[derive(Default)]
struct SharedState {
    /// In-flight dedup: URL string to the method queued for it.
    enqueued: HashMap<String, Method>,
    /// Hosts whose pages are expanded recursively.
    crawl_hosts: HashSet<String>,
}

/// Point-in-time scheduler counters for the admin surface.
#[derive(Debug, Clone)]
pub struct SchedulerStats {
    pub in_flight: usize,
    pub crawl_hosts: usize,
    pub crawl_active: usize,
    pub content_active: usize,
    pub seed_active: usize,
}

/// Handle to the crawl engine. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    state: Mutex<SharedState>,
    repos: Repositories,
    handler: ResponseHandler,
    stale: Duration,
    seed_batch: i64,
    crawl: Arc<FetchQueue>,
    content: Arc<FetchQueue>,
    seed: Arc<FetchQueue>,
    stop_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        repos: Repositories,
        blob: Arc<dyn BlobStore>,
        settings: &Settings,
    ) -> Result<Self, CrawlError> {
        let client = HttpClient::new(&settings.user_agent, settings.request_timeout)?;
        let pipeline = ContentPipeline::new(
            blob,
            settings.bucket_path.clone(),
            settings.store_content_types.clone(),
        );
        let handler = ResponseHandler::new(repos.clone(), pipeline, settings.stale_duration);
        let (stop_tx, _) = watch::channel(false);

        let delay = settings.crawl_delay;
        let polite = settings.polite;
        let inner = Arc::new_cyclic(|weak: &Weak<SchedulerInner>| {
            let responder: Weak<dyn Responder> = weak.clone();
            SchedulerInner {
                state: Mutex::new(SharedState::default()),
                repos,
                handler,
                stale: settings.stale_duration,
                seed_batch: settings.seed_batch_size,
                crawl: FetchQueue::new(
                    QueueKind::Crawl,
                    client.clone(),
                    delay,
                    polite,
                    responder.clone(),
                ),
                content: FetchQueue::new(
                    QueueKind::Content,
                    client.clone(),
                    delay,
                    polite,
                    responder.clone(),
                ),
                seed: FetchQueue::new(QueueKind::Seed, client, delay, polite, responder),
                stop_tx,
            }
        });
        Ok(Self { inner })
    }

    /// Run the initial seed and start the periodic staleness sweep.
    pub fn start(&self) {
        seeder::spawn(self.clone(), self.inner.stale);
    }

    /// Admit an externally submitted URL (see the seed queue).
    ///
    /// The URL must parse, be http(s), and fall under a configured source
    /// prefix. The record is upserted either way; a GET is enqueued only
    /// when the record is stale.
    pub async fn submit(&self, raw: &str) -> Result<String, CrawlError> {
        let normalized = normalize(raw).map_err(|e| CrawlError::InvalidInput(e.to_string()))?;
        if !freshness::is_fetchable(&normalized) {
            return Err(CrawlError::InvalidInput(format!(
                "{} is not an http(s) url",
                normalized
            )));
        }
        let covering = self.inner.repos.sources.containing(&normalized).await?;
        if covering.is_empty() {
            return Err(CrawlError::NotArchivable(normalized));
        }

        let record = self
            .inner
            .repos
            .urls
            .create_if_missing(&Url::new(normalized.clone(), host_of(&normalized)))
            .await?;

        // A per-source staleness override narrows or widens the window
        let stale = covering
            .iter()
            .find_map(|s| s.stale_hours)
            .map(|h| Duration::from_secs(h.max(0) as u64 * 3600))
            .unwrap_or(self.inner.stale);
        if freshness::should_enqueue_get(&record, stale, now_secs()) {
            self.inner.enqueue(&self.inner.seed, &normalized, Method::Get);
        } else {
            debug!("{} is fresh, not re-archiving", normalized);
        }
        Ok(normalized)
    }

    /// Seed the crawl queue: every crawl-enabled source plus a batch of
    /// unfetched URLs. Returns how many fetches were enqueued.
    pub async fn seed(&self) -> Result<usize, CrawlError> {
        let inner = &self.inner;
        let mut enqueued = 0;

        for source in inner.repos.sources.crawl_sources().await? {
            let normalized = match normalize(&source.url) {
                Ok(n) => n,
                Err(e) => {
                    warn!("skipping source {} with bad url: {}", source.id, e);
                    continue;
                }
            };
            if !freshness::is_fetchable(&normalized) {
                warn!("skipping non-http source {}", source.url);
                continue;
            }
            let host = host_of(&normalized);
            if !host.is_empty() {
                inner.state.lock().unwrap().crawl_hosts.insert(host.clone());
            }
            inner
                .repos
                .urls
                .create_if_missing(&Url::new(normalized.clone(), host))
                .await?;
            if inner.enqueue(&inner.crawl, &normalized, Method::Get) {
                enqueued += 1;
            }
        }

        for record in inner.repos.urls.list_unfetched(inner.seed_batch).await? {
            if !freshness::is_fetchable(&record.url) {
                continue;
            }
            if inner.enqueue(&inner.crawl, &record.url, Method::Get) {
                enqueued += 1;
            }
        }

        Ok(enqueued)
    }

    /// Refuse new work and drain all three queues.
    pub async fn close(&self) {
        self.inner.stop_tx.send_replace(true);
        self.inner.crawl.close().await;
        self.inner.content.close().await;
        self.inner.seed.close().await;
        info!("scheduler closed");
    }

    /// Drop queued work and wind the queues down.
    pub async fn cancel(&self) {
        self.inner.stop_tx.send_replace(true);
        self.inner.crawl.cancel();
        self.inner.content.cancel();
        self.inner.seed.cancel();
        self.inner.crawl.join().await;
        self.inner.content.join().await;
        self.inner.seed.join().await;
        info!("scheduler cancelled");
    }

    /// The in-flight set, for the admin queue listing.
    pub fn enqueued_snapshot(&self) -> Vec<(String, Method)> {
        let state = self.inner.state.lock().unwrap();
        let mut entries: Vec<_> = state
            .enqueued
            .iter()
            .map(|(url, method)| (url.clone(), *method))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.inner.state.lock().unwrap();
        SchedulerStats {
            in_flight: state.enqueued.len(),
            crawl_hosts: state.crawl_hosts.len(),
            crawl_active: self.inner.crawl.active_len(),
            content_active: self.inner.content.active_len(),
            seed_active: self.inner.seed.active_len(),
        }
    }

    pub(crate) fn stop_receiver(&self) -> watch::Receiver<bool> {
        self.inner.stop_tx.subscribe()
    }
}

impl SchedulerInner {
    /// Reserve the in-flight slot for a URL. The slot is released when
    /// the response (or a discard) comes back.
    fn mark_enqueued(&self, url: &str, method: Method) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.enqueued.contains_key(url) {
            return false;
        }
        state.enqueued.insert(url.to_string(), method);
        true
    }

    fn clear_enqueued(&self, url: &str) {
        self.state.lock().unwrap().enqueued.remove(url);
    }

    fn is_crawl_host(&self, url: &str) -> bool {
        let host = host_of(url);
        !host.is_empty() && self.state.lock().unwrap().crawl_hosts.contains(&host)
    }

    /// Dedup-checked enqueue onto one of the queues.
    fn enqueue(&self, queue: &Arc<FetchQueue>, url: &str, method: Method) -> bool {
        if !self.mark_enqueued(url, method) {
            debug!("{} already in flight, skipping {}", url, method);
            return false;
        }
        let accepted = queue.enqueue(FetchTask {
            url: url.to_string(),
            method,
        });
        if !accepted {
            self.clear_enqueued(url);
        }
        accepted
    }

    /// Fan discovered links back into the crawl queue as HEADs.
    async fn expand_links(&self, links: &[magpie::models::Link]) {
        let now = now_secs();
        for link in links {
            let record = match self.repos.urls.get(&link.dst).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!("lookup of {} failed during expansion: {}", link.dst, e);
                    continue;
                }
            };
            if freshness::should_enqueue_head(&record, self.stale, now) {
                self.enqueue(&self.crawl, &record.url, Method::Head);
            }
        }
    }
}

#[async_trait]
impl Responder for SchedulerInner {
    async fn on_response(
        &self,
        queue: QueueKind,
        task: FetchTask,
        result: Result<Fetched, reqwest::Error>,
    ) {
        // Release the in-flight slot first so promotions can re-enqueue
        self.clear_enqueued(&task.url);

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                // No retry here; the staleness sweep re-enqueues later
                warn!("{} {} failed: {}", task.method, task.url, e);
                return;
            }
        };

        let now = now_secs();
        match task.method {
            Method::Head => {
                let is_crawl_host = self.is_crawl_host(&task.url);
                match self.handler.handle_head(&fetched, is_crawl_host, now).await {
                    Ok(outcome) => {
                        if outcome.crawl_get {
                            self.enqueue(&self.crawl, &task.url, Method::Get);
                        } else if outcome.content_get {
                            self.enqueue(&self.content, &task.url, Method::Get);
                        }
                    }
                    Err(e) => warn!("head handling of {} failed: {}", task.url, e),
                }
            }
            Method::Get => match self.handler.handle_get(&fetched, now).await {
                Ok(outcome) => {
                    debug!("{} yielded {} links", task.url, outcome.links.len());
                    // Content fetches are side-band; only page queues expand
                    if matches!(queue, QueueKind::Crawl | QueueKind::Seed) {
                        self.expand_links(&outcome.links).await;
                    }
                }
                Err(e) => warn!("get handling of {} failed: {}", task.url, e),
            },
        }
    }

    fn on_discarded(&self, _queue: QueueKind, task: FetchTask) {
        self.clear_enqueued(&task.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie::models::Source;
    use magpie::repository::AsyncSqlitePool;
    use magpie::storage::MemoryBlobStore;

    async fn setup() -> (Scheduler, Repositories, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repos = Repositories::new(AsyncSqlitePool::from_path(&dir.path().join("test.db")));
        repos.init_schema().await.unwrap();
        let settings = Settings {
            polite: false,
            ..Settings::default()
        };
        let scheduler =
            Scheduler::new(repos.clone(), Arc::new(MemoryBlobStore::new()), &settings).unwrap();
        (scheduler, repos, dir)
    }

    #[tokio::test]
    async fn in_flight_dedup_is_a_no_op_on_second_enqueue() {
        let (scheduler, _repos, _dir) = setup().await;
        let inner = &scheduler.inner;
        assert!(inner.mark_enqueued("http://example.com/a", Method::Head));
        assert!(!inner.mark_enqueued("http://example.com/a", Method::Get));
        inner.clear_enqueued("http://example.com/a");
        assert!(inner.mark_enqueued("http://example.com/a", Method::Get));
    }

    #[tokio::test]
    async fn submit_rejects_unparseable_and_non_http() {
        let (scheduler, repos, _dir) = setup().await;
        assert!(matches!(
            scheduler.submit("not a url").await,
            Err(CrawlError::InvalidInput(_))
        ));
        assert!(matches!(
            scheduler.submit("mailto:foo@bar").await,
            Err(CrawlError::InvalidInput(_))
        ));
        assert_eq!(repos.urls.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn submit_rejects_urls_outside_every_source() {
        let (scheduler, repos, _dir) = setup().await;
        repos
            .sources
            .save(&Source::new(
                "http://example.com".into(),
                "Example".into(),
                true,
            ))
            .await
            .unwrap();

        let err = scheduler.submit("http://other.com/x").await.unwrap_err();
        match err {
            CrawlError::NotArchivable(url) => assert_eq!(url, "http://other.com/x"),
            other => panic!("expected NotArchivable, got {:?}", other),
        }
        assert_eq!(repos.urls.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn submit_upserts_record_for_covered_urls() {
        let (scheduler, repos, _dir) = setup().await;
        repos
            .sources
            .save(&Source::new(
                "http://example.com".into(),
                "Example".into(),
                true,
            ))
            .await
            .unwrap();
        // Close first so nothing actually fetches
        scheduler.close().await;

        let normalized = scheduler
            .submit("HTTP://example.com//a.html")
            .await
            .unwrap();
        assert_eq!(normalized, "http://example.com/a.html");
        assert!(repos.urls.get(&normalized).await.unwrap().is_some());
        assert!(scheduler.enqueued_snapshot().is_empty());
    }

    #[tokio::test]
    async fn fresh_records_are_not_resubmitted() {
        let (scheduler, repos, _dir) = setup().await;
        repos
            .sources
            .save(&Source::new(
                "http://example.com".into(),
                "Example".into(),
                true,
            ))
            .await
            .unwrap();
        let mut record = Url::new("http://example.com/a".into(), "example.com".into());
        record.last_get = Some(now_secs());
        repos.urls.save(&record).await.unwrap();

        scheduler.submit("http://example.com/a").await.unwrap();
        // Fresh within the staleness window: nothing went in flight
        assert!(scheduler.enqueued_snapshot().is_empty());
    }

    #[tokio::test]
    async fn seed_registers_crawl_hosts_and_records() {
        let (scheduler, repos, _dir) = setup().await;
        repos
            .sources
            .save(&Source::new(
                // Nothing listens here; fetches fail fast and that is fine
                "http://127.0.0.1:9".into(),
                "Local".into(),
                true,
            ))
            .await
            .unwrap();

        let enqueued = scheduler.seed().await.unwrap();
        assert!(enqueued >= 1, "expected at least the source seed, got {}", enqueued);
        assert_eq!(scheduler.stats().crawl_hosts, 1);
        assert!(repos.urls.get("http://127.0.0.1:9/").await.unwrap().is_some());

        scheduler.close().await;
    }

    #[tokio::test]
    async fn closed_scheduler_refuses_enqueues_and_clears_marks() {
        let (scheduler, _repos, _dir) = setup().await;
        scheduler.close().await;
        let inner = &scheduler.inner;
        assert!(!inner.enqueue(&inner.crawl, "http://example.com/a", Method::Head));
        assert!(scheduler.enqueued_snapshot().is_empty());
    }
}
