// src/config.rs
// =============================================================================
// Command-line configuration, parsed with `clap`'s derive API. Mirrors the
// original's `ParseConfig`/`port()` helper: the listening port falls back to
// the `PORT` environment variable, and one `Config` drives both the crawler
// and the server the way `main.go` builds two engines from one parsed
// config.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use clap::Parser;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "webmirror",
    version,
    about = "Mirrors a website: crawls it, rewrites links to be host-agnostic, and serves the result from cache"
)]
pub struct Cli {
    /// Seed URL to crawl and mirror.
    pub seed: Url,

    /// Port to serve the mirror on. Falls back to the PORT environment
    /// variable, then 8080.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Restrict crawling to these hosts. Repeatable. Empty means unrestricted.
    #[arg(long = "host-whitelist")]
    pub host_whitelist: Vec<String>,

    /// Treat one host as an alias of another for whitelist/dedup purposes.
    /// Repeatable, `from=to` form.
    #[arg(long = "host-rewrite")]
    pub host_rewrites: Vec<String>,

    /// How many hops of discovered links to auto-enqueue. 0 crawls only the seed.
    #[arg(long, default_value_t = 0)]
    pub auto_download_depth: u32,

    /// If set, re-enqueue the seed on this cadence to pick up changes.
    #[arg(long)]
    pub auto_enqueue_interval_secs: Option<u64>,

    /// Number of concurrent crawl workers.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Extends a cache entry's expiry by this many seconds every time it's
    /// rewritten (the "bump TTL" policy). 0 disables bumping.
    #[arg(long, default_value_t = 0)]
    pub bump_ttl_secs: i64,

    /// Bypass any configured HTTP(S) proxy for this engine's requests.
    #[arg(long)]
    pub no_proxy: bool,
}

/// The parsed, validated form of `Cli`: `host_rewrite` strings split into a
/// map, durations converted from raw seconds.
#[derive(Debug, Clone)]
pub struct Config {
    pub seed: Url,
    pub port: u16,
    pub host_whitelist: HashSet<String>,
    pub host_rewrites: HashMap<String, String>,
    pub auto_download_depth: u32,
    pub auto_enqueue_interval: Option<Duration>,
    pub workers: usize,
    pub bump_ttl: chrono::Duration,
    pub no_proxy: bool,
}

impl TryFrom<Cli> for Config {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let mut host_rewrites = HashMap::with_capacity(cli.host_rewrites.len());
        for entry in &cli.host_rewrites {
            let (from, to) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("--host-rewrite expects `from=to`, got `{entry}`"))?;
            host_rewrites.insert(from.to_string(), to.to_string());
        }

        Ok(Config {
            seed: cli.seed,
            port: cli.port,
            host_whitelist: cli.host_whitelist.into_iter().collect(),
            host_rewrites,
            auto_download_depth: cli.auto_download_depth,
            auto_enqueue_interval: cli.auto_enqueue_interval_secs.map(Duration::from_secs),
            workers: cli.workers,
            bump_ttl: chrono::Duration::seconds(cli.bump_ttl_secs),
            no_proxy: cli.no_proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn host_rewrite_requires_equals_sign() {
        let cli = Cli::parse_from([
            "webmirror",
            "http://seed.example/",
            "--host-rewrite",
            "no-equals-sign",
        ]);
        assert!(Config::try_from(cli).is_err());
    }

    #[test]
    fn host_rewrite_splits_on_first_equals() {
        let cli = Cli::parse_from([
            "webmirror",
            "http://seed.example/",
            "--host-rewrite",
            "api.example=mirror.local",
        ]);
        let config = Config::try_from(cli).unwrap();
        assert_eq!(
            config.host_rewrites.get("api.example"),
            Some(&"mirror.local".to_string())
        );
    }
}
