// src/engine.rs
// =============================================================================
// Wires a `Cacher`, a `Crawler`, and a `Server` together under one `Config` -
// the Rust counterpart of the original's `engine.Engine`/`engine.FromConfig`.
// Not itself part of CORE; it's the thing `main.rs` constructs.
// =============================================================================

use std::sync::Arc;

use url::Url;

use crate::cache::{Cacher, MemoryCacher};
use crate::config::Config;
use crate::crawler::{Crawler, CrawlerConfig, CrawlerHandle};
use crate::issue::IssueBus;
use crate::server::Server;

pub struct Engine {
    pub cacher: Arc<dyn Cacher>,
    pub crawler: Arc<Crawler>,
    pub server: Arc<Server>,
    pub issue_bus_receiver: Option<tokio::sync::mpsc::Receiver<crate::issue::Issue>>,
}

impl Engine {
    /// Builds the crawler and server described by `config`, sharing one
    /// in-memory cache between them. The crawler's download failures and
    /// the server's serve-time issues both land on the same `IssueBus`.
    pub fn from_config(config: Config) -> Self {
        let cacher: Arc<dyn Cacher> = Arc::new(MemoryCacher::new(config.bump_ttl));
        let (issue_bus, issue_bus_receiver) = IssueBus::new(256);

        let crawler_config = CrawlerConfig {
            host_whitelist: config.host_whitelist.clone(),
            host_rewrites: config.host_rewrites.clone(),
            auto_download_depth: config.auto_download_depth,
            auto_enqueue_interval: config.auto_enqueue_interval,
            workers: config.workers,
            no_proxy: config.no_proxy,
            queue_capacity: 256,
        };

        let crawler = Crawler::new(
            config.seed.clone(),
            Arc::clone(&cacher),
            crawler_config,
            Some(issue_bus.clone()),
        );

        let server = Server::new(Arc::clone(&cacher));
        server.set_on_server_issue(Arc::new(move |issue| issue_bus.server(issue.issue_type, issue.url.clone(), issue.info.clone())));

        Engine {
            cacher,
            crawler,
            server,
            issue_bus_receiver: Some(issue_bus_receiver),
        }
    }

    /// Starts the crawl and binds the server on `config.port`, serving the
    /// seed's own host (the common single-site mirroring case).
    pub async fn start(&self, seed: &Url, port: u16) -> anyhow::Result<CrawlerHandle> {
        let handle = self.crawler.start().await;
        self.server.listen_and_serve(Some(seed.clone()), port).await?;
        Ok(handle)
    }

    pub async fn stop(&self, crawler_handle: CrawlerHandle) -> Vec<String> {
        crawler_handle.stop().await;
        self.server.stop().await
    }
}
