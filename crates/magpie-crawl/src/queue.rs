//! Polite fetch queues.
//!
//! Each queue dispatches through one serial worker task per host, which
//! gives FIFO order within a host for free and makes the politeness delay
//! local state: a host with an in-flight request never has a second one
//! dispatched until `delay` has elapsed. A queue-wide semaphore bounds
//! concurrent fetches; idle host workers retire after a quiet period.
//!
//! Responses are delivered to a [`Responder`] (the scheduler) on the
//! worker task that completed the fetch. The queue holds only a `Weak`
//! reference so shutdown is not kept alive by its own workers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Notify, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use crate::client::{Fetched, HttpClient, Method};
use crate::normalize::host_of;

/// Concurrent fetches per queue.
const WORKER_PERMITS: usize = 8;

/// How long an idle host worker lingers before retiring.
const HOST_IDLE_TTL: Duration = Duration::from_secs(60);

/// Which queue a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Main link exploration: HEAD and GET of pages.
    Crawl,
    /// Side-band GETs of discovered file URLs.
    Content,
    /// Externally submitted URLs to archive.
    Seed,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Content => "content",
            Self::Seed => "seed",
        }
    }
}

/// One unit of fetch work.
#[derive(Debug, Clone)]
pub struct FetchTask {
    pub url: String,
    pub method: Method,
}

/// Receives completed fetches and discarded tasks.
#[async_trait]
pub trait Responder: Send + Sync {
    /// A fetch finished, successfully or not. Runs on the worker task.
    async fn on_response(
        &self,
        queue: QueueKind,
        task: FetchTask,
        result: Result<Fetched, reqwest::Error>,
    );

    /// A queued task was dropped without being dispatched (cancel or
    /// shutdown); in-flight bookkeeping must be released.
    fn on_discarded(&self, queue: QueueKind, task: FetchTask);
}

/// Work outstanding in a queue: queued plus in-flight.
#[derive(Default)]
struct ActiveCount {
    count: AtomicUsize,
    drained: Notify,
}

impl ActiveCount {
    fn inc(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn dec(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// A single fetch queue with per-host politeness.
pub struct FetchQueue {
    kind: QueueKind,
    client: HttpClient,
    delay: Duration,
    polite: bool,
    hosts: Mutex<HashMap<String, mpsc::UnboundedSender<FetchTask>>>,
    permits: Arc<Semaphore>,
    cancel_tx: watch::Sender<bool>,
    closed: AtomicBool,
    active: ActiveCount,
    responder: Weak<dyn Responder>,
    self_weak: Weak<FetchQueue>,
}

impl FetchQueue {
    pub fn new(
        kind: QueueKind,
        client: HttpClient,
        delay: Duration,
        polite: bool,
        responder: Weak<dyn Responder>,
    ) -> Arc<Self> {
        let (cancel_tx, _) = watch::channel(false);
        Arc::new_cyclic(|self_weak| Self {
            kind,
            client,
            delay,
            polite,
            hosts: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(WORKER_PERMITS)),
            cancel_tx,
            closed: AtomicBool::new(false),
            active: ActiveCount::default(),
            responder,
            self_weak: self_weak.clone(),
        })
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Hand a task to its host worker. Returns false when the queue no
    /// longer accepts work.
    pub fn enqueue(&self, task: FetchTask) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let host = host_of(&task.url);
        self.active.inc();

        let mut hosts = self.hosts.lock().unwrap();
        let task = if let Some(tx) = hosts.get(&host) {
            match tx.send(task) {
                Ok(()) => return true,
                // The worker retired between lookup and send; replace it
                Err(mpsc::error::SendError(task)) => task,
            }
        } else {
            task
        };
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive until the worker takes it, so this send
        // cannot fail.
        let _ = tx.send(task);
        hosts.insert(host.clone(), tx);
        drop(hosts);
        self.spawn_host_worker(host, rx);
        true
    }

    /// Refuse new work and wait for everything queued to finish.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.hosts.lock().unwrap().clear();
        self.active.wait_drained().await;
    }

    /// Refuse new work and drop everything still queued.
    pub fn cancel(&self) {
        self.closed.store(true, Ordering::Release);
        self.hosts.lock().unwrap().clear();
        let _ = self.cancel_tx.send(true);
    }

    /// Wait for workers to wind down after `cancel`.
    pub async fn join(&self) {
        self.active.wait_drained().await;
    }

    /// Queued plus in-flight task count.
    pub fn active_len(&self) -> usize {
        self.active.count.load(Ordering::Acquire)
    }

    fn spawn_host_worker(&self, host: String, mut rx: mpsc::UnboundedReceiver<FetchTask>) {
        let Some(queue) = self.self_weak.upgrade() else {
            return;
        };
        let mut cancel_rx = self.cancel_tx.subscribe();
        tokio::spawn(async move {
            let mut last_dispatch: Option<Instant> = None;
            loop {
                let task = tokio::select! {
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            queue.discard_remaining(&host, &mut rx);
                            return;
                        }
                        continue;
                    }
                    received = rx.recv() => match received {
                        Some(task) => task,
                        // Sender dropped: queue closed or worker replaced
                        None => return,
                    },
                    _ = tokio::time::sleep(HOST_IDLE_TTL) => {
                        match queue.try_retire(&host, &mut rx) {
                            Some(task) => task,
                            None => return,
                        }
                    }
                };

                if queue.polite {
                    if let Some(last) = last_dispatch {
                        let remaining = queue.delay.saturating_sub(last.elapsed());
                        if !remaining.is_zero()
                            && !sleep_or_cancel(remaining, &mut cancel_rx).await
                        {
                            queue.discard_task(task);
                            queue.discard_remaining(&host, &mut rx);
                            return;
                        }
                    }
                }

                let Ok(_permit) = queue.permits.acquire().await else {
                    queue.discard_task(task);
                    queue.discard_remaining(&host, &mut rx);
                    return;
                };
                last_dispatch = Some(Instant::now());
                queue.dispatch(task).await;
                queue.active.dec();
            }
        });
    }

    async fn dispatch(&self, task: FetchTask) {
        debug!("{}: {} {}", self.kind.as_str(), task.method, task.url);
        let result = self.client.fetch(&task.url, task.method).await;
        if let Some(responder) = self.responder.upgrade() {
            responder.on_response(self.kind, task, result).await;
        }
    }

    /// Remove this host's entry if nothing arrived while idle; a task
    /// that raced in keeps the worker alive.
    fn try_retire(&self, host: &str, rx: &mut mpsc::UnboundedReceiver<FetchTask>) -> Option<FetchTask> {
        let mut hosts = self.hosts.lock().unwrap();
        match rx.try_recv() {
            Ok(task) => Some(task),
            Err(mpsc::error::TryRecvError::Empty) => {
                hosts.remove(host);
                None
            }
            Err(mpsc::error::TryRecvError::Disconnected) => None,
        }
    }

    /// Drop one task without dispatching it.
    fn discard_task(&self, task: FetchTask) {
        if let Some(responder) = self.responder.upgrade() {
            responder.on_discarded(self.kind, task);
        }
        self.active.dec();
    }

    /// Drop queued tasks on cancel, releasing their bookkeeping.
    fn discard_remaining(&self, host: &str, rx: &mut mpsc::UnboundedReceiver<FetchTask>) {
        self.hosts.lock().unwrap().remove(host);
        while let Ok(task) = rx.try_recv() {
            self.discard_task(task);
        }
    }
}

/// Sleep the given duration unless the cancel signal arrives first.
/// Returns false on cancel.
async fn sleep_or_cancel(duration: Duration, cancel_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        changed = cancel_rx.changed() => !(changed.is_err() || *cancel_rx.borrow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records response arrival times; fetches hit a closed local port and
    /// fail fast, which is all the timing tests need.
    struct RecordingResponder {
        responses: StdMutex<Vec<(String, Instant)>>,
        discarded: StdMutex<Vec<String>>,
    }

    impl RecordingResponder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(Vec::new()),
                discarded: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn on_response(
            &self,
            _queue: QueueKind,
            task: FetchTask,
            _result: Result<Fetched, reqwest::Error>,
        ) {
            self.responses.lock().unwrap().push((task.url, Instant::now()));
        }

        fn on_discarded(&self, _queue: QueueKind, task: FetchTask) {
            self.discarded.lock().unwrap().push(task.url);
        }
    }

    fn test_client() -> HttpClient {
        HttpClient::new("magpie-test", Duration::from_secs(1)).unwrap()
    }

    fn queue(
        responder: &Arc<RecordingResponder>,
        delay: Duration,
        polite: bool,
    ) -> Arc<FetchQueue> {
        let responder: Arc<dyn Responder> = responder.clone();
        let weak: Weak<dyn Responder> = Arc::downgrade(&responder);
        FetchQueue::new(QueueKind::Crawl, test_client(), delay, polite, weak)
    }

    fn task(url: &str) -> FetchTask {
        FetchTask {
            url: url.to_string(),
            method: Method::Get,
        }
    }

    #[tokio::test]
    async fn same_host_dispatches_respect_the_delay() {
        let responder = RecordingResponder::new();
        let q = queue(&responder, Duration::from_millis(150), true);

        // Nothing listens on this port; fetches fail immediately
        assert!(q.enqueue(task("http://127.0.0.1:9/a")));
        assert!(q.enqueue(task("http://127.0.0.1:9/b")));
        q.close().await;

        let responses = responder.responses.lock().unwrap();
        assert_eq!(responses.len(), 2);
        let gap = responses[1].1.duration_since(responses[0].1);
        assert!(gap >= Duration::from_millis(140), "gap was {:?}", gap);
    }

    #[tokio::test]
    async fn impolite_queues_skip_the_delay() {
        let responder = RecordingResponder::new();
        let q = queue(&responder, Duration::from_secs(60), false);

        assert!(q.enqueue(task("http://127.0.0.1:9/a")));
        assert!(q.enqueue(task("http://127.0.0.1:9/b")));
        q.close().await;

        assert_eq!(responder.responses.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn same_host_order_is_fifo() {
        let responder = RecordingResponder::new();
        let q = queue(&responder, Duration::from_millis(10), true);

        for path in ["a", "b", "c"] {
            q.enqueue(task(&format!("http://127.0.0.1:9/{}", path)));
        }
        q.close().await;

        let urls: Vec<String> = responder
            .responses
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.clone())
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://127.0.0.1:9/a",
                "http://127.0.0.1:9/b",
                "http://127.0.0.1:9/c"
            ]
        );
    }

    #[tokio::test]
    async fn closed_queues_refuse_work() {
        let responder = RecordingResponder::new();
        let q = queue(&responder, Duration::from_millis(1), true);
        q.close().await;
        assert!(!q.enqueue(task("http://127.0.0.1:9/a")));
        assert_eq!(q.active_len(), 0);
    }

    #[tokio::test]
    async fn cancel_discards_queued_tasks() {
        let responder = RecordingResponder::new();
        // A long polite delay keeps the later tasks queued
        let q = queue(&responder, Duration::from_secs(60), true);

        q.enqueue(task("http://127.0.0.1:9/a"));
        q.enqueue(task("http://127.0.0.1:9/b"));
        q.enqueue(task("http://127.0.0.1:9/c"));

        // Give the first dispatch a moment to happen
        tokio::time::sleep(Duration::from_millis(200)).await;
        q.cancel();
        q.join().await;

        let responses = responder.responses.lock().unwrap().len();
        let discarded = responder.discarded.lock().unwrap().len();
        assert_eq!(responses + discarded, 3);
        assert!(discarded >= 1, "expected queued tasks to be discarded");
    }
}
