// src/lib.rs
// =============================================================================
// Library surface: URL/HTML/CSS utilities, the downloader, the cache
// contract, the crawler, the server, and the issue bus that ties crawler and
// server together. `main.rs` is a thin CLI shell built on top of this.
// =============================================================================

pub mod cache;
pub mod config;
pub mod crawler;
pub mod css;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod html;
pub mod issue;
pub mod link;
pub mod server;
pub mod url_util;

pub use cache::{CacheEntry, CachedResponse, Cacher, MemoryCacher};
pub use config::{Cli, Config};
pub use crawler::{Crawler, CrawlerConfig, CrawlerHandle};
pub use downloader::{download, Downloaded};
pub use engine::Engine;
pub use error::MirrorError;
pub use html::{rewrite_html, HtmlRewrite};
pub use issue::{DownloadIssue, Issue, IssueBus, ServerIssue, ServerIssueType};
pub use link::{Link, LinkContext};
pub use server::Server;
