// src/cache/memory.rs
// =============================================================================
// The default `Cacher`: a sharded in-memory map keyed by the request URL's
// string form. It exists so the crate is runnable end to end without a real
// persistence layer - the on-disk byte layout the specification keeps out of
// scope is simply "whatever `dashmap` does," which is fine for a reference
// backend and for tests.
// =============================================================================

use chrono::{Duration, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use url::Url;

use super::{CacheEntry, CachedResponse, Cacher};
use crate::error::MirrorError;

pub struct MemoryCacher {
    entries: DashMap<String, CachedResponse>,
    bump_ttl: Duration,
}

impl MemoryCacher {
    /// `bump_ttl` is the amount by which an existing entry's `Expires` is
    /// extended every time it's written again (the glossary's "Bump TTL").
    pub fn new(bump_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            bump_ttl,
        }
    }
}

impl Default for MemoryCacher {
    fn default() -> Self {
        Self::new(Duration::zero())
    }
}

impl Cacher for MemoryCacher {
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<CacheEntry, MirrorError>> {
        let key = url.to_string();
        Box::pin(async move {
            self.entries
                .get(&key)
                .map(|entry| entry.clone())
                .ok_or(MirrorError::CacheMiss)
        })
    }

    fn write<'a>(
        &'a self,
        url: &'a Url,
        mut response: CachedResponse,
    ) -> BoxFuture<'a, Result<(), MirrorError>> {
        let key = url.to_string();
        Box::pin(async move {
            if self.bump_ttl > Duration::zero() && self.entries.contains_key(&key) {
                response.expires = Some(Utc::now() + self.bump_ttl);
            }
            self.entries.insert(key, response);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bumps_ttl_on_rewrite_of_existing_key() {
        let cacher = MemoryCacher::new(Duration::seconds(60));
        let url = Url::parse("http://d.com/p").unwrap();

        cacher
            .write(
                &url,
                CachedResponse {
                    status_code: 200,
                    headers: vec![],
                    body: vec![],
                    expires: None,
                },
            )
            .await
            .unwrap();
        let first = cacher.open(&url).await.unwrap();
        assert!(first.expires.is_none());

        cacher
            .write(
                &url,
                CachedResponse {
                    status_code: 200,
                    headers: vec![],
                    body: vec![],
                    expires: None,
                },
            )
            .await
            .unwrap();
        let second = cacher.open(&url).await.unwrap();
        assert!(second.expires.is_some());
    }
}
