// src/cache/mod.rs
// =============================================================================
// The cache contract (§6 of the specification): an opaque, content-addressed
// store keyed by request URL. The on-disk byte layout is explicitly out of
// scope for CORE - what CORE needs is `open`/`write`/`expires`, and this
// module defines that contract plus a simple in-memory implementation that
// satisfies it so the rest of the crate (and its tests) can run end to end
// without a real persistence layer.
// =============================================================================

mod memory;

pub use memory::MemoryCacher;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use url::Url;

use crate::error::MirrorError;

/// A cached HTTP response envelope: everything the server needs to replay a
/// request without re-fetching it.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub expires: Option<DateTime<Utc>>,
}

/// A handle returned by `Cacher::open`. For the in-memory backend this is
/// just the stored response; a real (file- or object-store-backed) cacher
/// would stream status/headers/body lazily instead.
pub type CacheEntry = CachedResponse;

/// The cache backend CORE depends on. Implementations are free to choose any
/// on-disk layout; CORE only ever calls these three methods.
pub trait Cacher: Send + Sync {
    /// Looks up the cached entry for `url`. `Err(MirrorError::CacheMiss)` if
    /// absent, `Err(MirrorError::CacheRead(_))` if present but unreadable.
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<CacheEntry, MirrorError>>;

    /// Writes (or overwrites) the entry for `url`. Idempotent by key.
    fn write<'a>(
        &'a self,
        url: &'a Url,
        response: CachedResponse,
    ) -> BoxFuture<'a, Result<(), MirrorError>>;

    /// The entry's expiry timestamp, if any.
    fn expires(&self, entry: &CacheEntry) -> Option<DateTime<Utc>> {
        entry.expires
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cacher_round_trips() {
        let cacher = MemoryCacher::new(chrono::Duration::seconds(0));
        let url = Url::parse("http://d.com/p").unwrap();

        assert!(matches!(
            cacher.open(&url).await.unwrap_err(),
            MirrorError::CacheMiss
        ));

        cacher
            .write(
                &url,
                CachedResponse {
                    status_code: 200,
                    headers: vec![],
                    body: b"hello".to_vec(),
                    expires: None,
                },
            )
            .await
            .unwrap();

        let entry = cacher.open(&url).await.unwrap();
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.body, b"hello");
    }
}
