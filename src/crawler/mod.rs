// src/crawler/mod.rs
// =============================================================================
// The crawler: a bounded pool of workers draining a shared queue, downloading
// each URL, writing successes to the cache, and (up to a configured depth)
// enqueuing the links a download turned up.
//
// Concurrency shape: one `tokio::sync::mpsc` bounded channel is the queue
// (backpressure = the sender suspending, per the resource model), a
// `dashmap::DashSet` is the "already seen" set (sharded, so concurrent
// enqueue calls don't serialize on a single mutex the way a `Mutex<HashSet>`
// would), and a `tokio::sync::watch` channel carries the stop signal - every
// worker checks it before it begins its next dequeue, so `stop()` never
// interrupts a download already in flight; it just lets the queue drain no
// further.
// =============================================================================

mod queue;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use reqwest::Client;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use url::Url;

use crate::cache::{CachedResponse, Cacher};
use crate::downloader::download;
use crate::issue::IssueBus;
use crate::link::LinkContext;

pub use queue::{dedup_key, QueueEntry};

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Empty means "no restriction" (every host is allowed).
    pub host_whitelist: HashSet<String>,
    /// Maps a discovered host to the host it should be treated as for
    /// whitelist/dedup purposes, e.g. mirroring an API host under the
    /// serving host's identity.
    pub host_rewrites: HashMap<String, String>,
    /// Links found at depth < this are auto-enqueued; `0` crawls only the seed.
    pub auto_download_depth: u32,
    /// If set, the seed is re-enqueued on this cadence (forcing a refresh).
    pub auto_enqueue_interval: Option<Duration>,
    pub workers: usize,
    pub no_proxy: bool,
    pub queue_capacity: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            host_whitelist: HashSet::new(),
            host_rewrites: HashMap::new(),
            auto_download_depth: 0,
            auto_enqueue_interval: None,
            workers: 4,
            no_proxy: false,
            queue_capacity: 256,
        }
    }
}

pub struct Crawler {
    seed: Url,
    config: CrawlerConfig,
    client: Client,
    cacher: Arc<dyn Cacher>,
    issue_bus: Option<IssueBus>,
    dedup: DashSet<String>,
    sender: mpsc::Sender<QueueEntry>,
    receiver: TokioMutex<mpsc::Receiver<QueueEntry>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl Crawler {
    pub fn new(
        seed: Url,
        cacher: Arc<dyn Cacher>,
        config: CrawlerConfig,
        issue_bus: Option<IssueBus>,
    ) -> Arc<Self> {
        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::none());
        if config.no_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().expect("reqwest client builds with static config");

        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        Arc::new(Self {
            seed,
            config,
            client,
            cacher,
            issue_bus,
            dedup: DashSet::new(),
            sender,
            receiver: TokioMutex::new(receiver),
            stop_tx,
            stop_rx,
        })
    }

    /// Applies `HostRewrites`, then enqueues the result at `depth` if its
    /// (rewritten) host is whitelisted and it hasn't been seen before.
    /// Returns `false` if the rewritten host was rejected, the URL was a
    /// dedup hit, or the queue is closed.
    pub async fn enqueue(self: &Arc<Self>, url: Url, depth: u32) -> bool {
        let url = self.rewrite_host(url);
        if !self.host_whitelisted(&url) {
            return false;
        }
        if !self.dedup.insert(dedup_key(&url)) {
            return false;
        }
        self.sender.send(QueueEntry { url, depth }).await.is_ok()
    }

    /// Enqueues the seed unconditionally: the seed URL is always admitted,
    /// whitelist or no whitelist, per the "seed always admitted" rule.
    async fn enqueue_seed(self: &Arc<Self>) {
        let url = self.rewrite_host(self.seed.clone());
        self.dedup.insert(dedup_key(&url));
        let _ = self.sender.send(QueueEntry { url, depth: 0 }).await;
    }

    /// Starts the seed crawl: enqueues the seed at depth 0 and spawns the
    /// worker pool (and, if configured, the auto-enqueue timer).
    pub async fn start(self: &Arc<Self>) -> CrawlerHandle {
        self.enqueue_seed().await;

        let mut workers = Vec::with_capacity(self.config.workers.max(1));
        for _ in 0..self.config.workers.max(1) {
            let crawler = Arc::clone(self);
            let stop_rx = self.stop_rx.clone();
            workers.push(tokio::spawn(worker_loop(crawler, stop_rx)));
        }

        let auto_enqueue = self.config.auto_enqueue_interval.map(|interval| {
            let crawler = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    ticker.tick().await;
                    // try_send, not send().await: a still-full queue means a
                    // tick is simply dropped rather than piling up behind it.
                    let url = crawler.rewrite_host(crawler.seed.clone());
                    let _ = crawler.sender.try_send(QueueEntry { url, depth: 0 });
                }
            })
        });

        CrawlerHandle {
            stop_tx: self.stop_tx.clone(),
            workers,
            auto_enqueue,
        }
    }

    /// Replaces `url`'s host with its configured rewrite target, if any.
    /// Applied before the whitelist check and before the URL becomes the
    /// one that's queued, downloaded, and cached - an alias host is meant to
    /// be fetched and cached under the canonical host's identity, not its
    /// own.
    fn rewrite_host(&self, mut url: Url) -> Url {
        let Some(host) = url.host_str() else {
            return url;
        };
        if let Some(rewritten) = self.config.host_rewrites.get(host).cloned() {
            let _ = url.set_host(Some(&rewritten));
        }
        url
    }

    fn host_whitelisted(&self, url: &Url) -> bool {
        if self.config.host_whitelist.is_empty() {
            return true;
        }
        match url.host_str() {
            Some(host) => self.config.host_whitelist.contains(host),
            None => false,
        }
    }
}

/// A handle to a running crawl. Dropping it leaks the workers; call
/// `stop().await` to shut them down and wait for the in-flight task (if any)
/// on each to finish.
pub struct CrawlerHandle {
    stop_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    auto_enqueue: Option<JoinHandle<()>>,
}

impl CrawlerHandle {
    /// Signals every worker to stop before its next dequeue and waits for
    /// them to exit. The queue is discarded, not drained.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.auto_enqueue {
            handle.abort();
        }
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn worker_loop(crawler: Arc<Crawler>, mut stop_rx: watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow() {
            return;
        }

        let entry = {
            let mut receiver = crawler.receiver.lock().await;
            tokio::select! {
                biased;
                _ = stop_rx.changed() => None,
                entry = receiver.recv() => entry,
            }
        };

        let Some(entry) = entry else {
            return;
        };

        process_entry(&crawler, entry).await;
    }
}

async fn process_entry(crawler: &Arc<Crawler>, entry: QueueEntry) {
    let downloaded = download(&crawler.client, &entry.url).await;

    if let Some(error) = downloaded.error {
        if let Some(bus) = &crawler.issue_bus {
            bus.download(entry.url, error);
        }
        return;
    }

    let body = if !downloaded.body_string.is_empty() {
        downloaded.body_string.clone().into_bytes()
    } else {
        downloaded.body_bytes.clone()
    };
    let cached = CachedResponse {
        status_code: downloaded.status_code,
        headers: vec![("content-type".to_string(), downloaded.content_type.clone())],
        body,
        expires: None,
    };
    let _ = crawler.cacher.write(&downloaded.url, cached).await;

    if entry.depth >= crawler.config.auto_download_depth {
        return;
    }

    for link in &downloaded.links {
        if link.context == LinkContext::Http3xxLocation {
            continue;
        }
        crawler.enqueue(link.url.clone(), entry.depth + 1).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacher;

    fn cacher() -> Arc<dyn Cacher> {
        Arc::new(MemoryCacher::default())
    }

    #[tokio::test]
    async fn enqueue_dedups_by_key() {
        let crawler = Crawler::new(
            Url::parse("http://d.com/").unwrap(),
            cacher(),
            CrawlerConfig::default(),
            None,
        );
        let url = Url::parse("http://d.com/p?x=1#frag").unwrap();
        assert!(crawler.enqueue(url.clone(), 0).await);
        assert!(!crawler.enqueue(url, 0).await);
    }

    #[tokio::test]
    async fn enqueue_rejects_non_whitelisted_host() {
        let mut config = CrawlerConfig::default();
        config.host_whitelist.insert("allowed.com".to_string());
        let crawler = Crawler::new(Url::parse("http://allowed.com/").unwrap(), cacher(), config, None);

        assert!(!crawler.enqueue(Url::parse("http://other.com/p").unwrap(), 0).await);
        assert!(crawler.enqueue(Url::parse("http://allowed.com/p").unwrap(), 0).await);
    }

    #[tokio::test]
    async fn host_rewrite_makes_alias_whitelisted_and_rewrites_the_queued_url() {
        let mut config = CrawlerConfig::default();
        config.host_whitelist.insert("canonical.com".to_string());
        config
            .host_rewrites
            .insert("alias.com".to_string(), "canonical.com".to_string());
        let crawler = Crawler::new(Url::parse("http://canonical.com/").unwrap(), cacher(), config, None);

        assert!(crawler.enqueue(Url::parse("http://alias.com/p").unwrap(), 0).await);

        let entry = crawler.receiver.lock().await.recv().await.unwrap();
        assert_eq!(entry.url.as_str(), "http://canonical.com/p");
        assert!(crawler.dedup.contains(&dedup_key(&Url::parse("http://canonical.com/p").unwrap())));
    }

    #[tokio::test]
    async fn seed_is_admitted_even_when_not_whitelisted() {
        let mut config = CrawlerConfig::default();
        config.host_whitelist.insert("other.com".to_string());
        let seed = Url::parse("http://seed.com/").unwrap();
        let crawler = Crawler::new(seed.clone(), cacher(), config, None);

        crawler.enqueue_seed().await;

        assert!(crawler.dedup.contains(&dedup_key(&seed)));
        let entry = crawler.receiver.lock().await.recv().await.unwrap();
        assert_eq!(entry.url, seed);
    }

    #[tokio::test]
    async fn crawl_caches_seed_and_stops_cleanly() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_header("content-type", "text/html")
            .with_body("<p>hi</p>")
            .create_async()
            .await;

        let seed = Url::parse(&server.url()).unwrap();
        let backend = cacher();
        let crawler = Crawler::new(seed.clone(), Arc::clone(&backend), CrawlerConfig::default(), None);
        let handle = crawler.start().await;

        // give the worker a chance to drain the one-item queue
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;

        assert!(backend.open(&seed).await.is_ok());
    }

    #[tokio::test]
    async fn download_failure_is_reported_on_the_issue_bus() {
        let (bus, mut rx) = crate::issue::IssueBus::new(4);
        let seed = Url::parse("http://127.0.0.1:1/unreachable").unwrap();
        let crawler = Crawler::new(seed, cacher(), CrawlerConfig::default(), Some(bus));
        let handle = crawler.start().await;

        let issue = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("issue bus should receive within timeout");
        assert!(matches!(issue, Some(crate::issue::Issue::Download(_))));

        handle.stop().await;
    }
}
