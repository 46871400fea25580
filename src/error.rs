// src/error.rs
// =============================================================================
// Crate-wide error kinds for the CORE components (downloader, cache, server).
// `anyhow` is still used at the CLI/engine glue boundary (see main.rs), but
// the library surface returns this typed enum so callers can match on
// specific failure kinds the way the specification's error table expects.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MirrorError {
    /// Nil client, nil URL, non-http scheme, or a relative URL. No network
    /// I/O is performed when this is returned.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// The underlying HTTP client failed (DNS, connect, timeout, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The `Location` response header was present but unparseable. Recovered
    /// locally by the downloader: `HeaderLocation` is left absent and the
    /// rest of the response is still recorded.
    #[error("could not parse Location header: {0}")]
    ParseLocation(String),

    /// The HTML/CSS body failed to parse. Recovered locally: the original
    /// bytes are preserved and `Links` may simply be shorter than expected.
    #[error("could not parse body: {0}")]
    ParseBody(String),

    /// No cache entry exists for the requested URL.
    #[error("cache miss")]
    CacheMiss,

    /// A cache entry exists but could not be read back.
    #[error("cache read error: {0}")]
    CacheRead(String),

    /// A cache entry exists, was read successfully, but its `Expires`
    /// timestamp is in the past. Non-fatal: the response is still served.
    #[error("cache entry expired")]
    CacheExpired,
}
