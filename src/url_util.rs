// src/url_util.rs
// =============================================================================
// URL utilities shared by the downloader, the HTML/CSS rewriters, and the
// crawler's dedup/host-policy logic.
//
// Everything here is built on top of the `url` crate, which already gives us
// RFC 3986 parsing and resolution (`Url::join`). The piece the `url` crate
// doesn't provide is `make_relative`: producing the shortest reference that
// resolves back to a target URL against a given base, which is what lets the
// mirrored body stay host-agnostic.
// =============================================================================

use url::Url;

/// Parses `s` as an absolute URL and rejects anything that isn't http/https
/// with a non-empty host. Relative references fail at `Url::parse` itself
/// (no base to resolve against), so this one check covers both "relative"
/// and "wrong scheme" from the contract.
pub fn parse_absolute(s: &str) -> Result<Url, url::ParseError> {
    let url = Url::parse(s)?;
    if is_absolute_http(&url) {
        Ok(url)
    } else {
        Err(url::ParseError::RelativeUrlWithoutBase)
    }
}

/// True iff `url`'s scheme is http/https and its host is non-empty.
pub fn is_absolute_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && !url.host_str().unwrap_or("").is_empty()
}

/// Returns a clone of `url` with an empty fragment.
pub fn strip_fragment(url: &Url) -> Url {
    let mut cloned = url.clone();
    cloned.set_fragment(None);
    cloned
}

/// Resolves `reference` against `base`, RFC 3986 style.
pub fn resolve(base: &Url, reference: &str) -> Result<Url, url::ParseError> {
    base.join(reference)
}

/// Produces the shortest reference such that `resolve(base, result) == target`
/// (modulo the fragment, which is preserved separately in the output string).
///
/// - If `target` and `base` are identical (scheme, host, path, query,
///   ignoring fragment), the result is `.`.
/// - If they share scheme, host and "directory" (all path segments but the
///   last), the result is just the final segment.
/// - Otherwise the result walks up from `base`'s directory to the common
///   ancestor and back down to `target`'s directory (`../sibling/file`).
/// - Cross-origin targets (different scheme or host) can't be made relative;
///   the absolute form (fragment stripped) is returned instead.
pub fn make_relative(target: &Url, base: &Url) -> String {
    let fragment = target.fragment();
    let mut target_no_frag = target.clone();
    target_no_frag.set_fragment(None);

    let body = make_relative_no_fragment(&target_no_frag, base);

    match fragment {
        Some(f) if !f.is_empty() => format!("{body}#{f}"),
        _ => body,
    }
}

fn make_relative_no_fragment(target: &Url, base: &Url) -> String {
    if target.scheme() != base.scheme()
        || target.host_str() != base.host_str()
        || target.port_or_known_default() != base.port_or_known_default()
    {
        return target.to_string();
    }

    if target.path() == base.path() && target.query() == base.query() {
        return ".".to_string();
    }

    let target_segments: Vec<&str> = target.path().split('/').collect();
    let base_segments: Vec<&str> = base.path().split('/').collect();

    let target_dir = &target_segments[..target_segments.len().saturating_sub(1)];
    let base_dir = &base_segments[..base_segments.len().saturating_sub(1)];

    let basename = target_segments.last().copied().unwrap_or("");

    if target_dir == base_dir {
        return append_query(basename.to_string(), target.query());
    }

    let common = target_dir
        .iter()
        .zip(base_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat("..".to_string()).take(base_dir.len() - common));
    parts.extend(target_dir[common..].iter().map(|s| s.to_string()));
    parts.push(basename.to_string());

    append_query(parts.join("/"), target.query())
}

fn append_query(mut path: String, query: Option<&str>) -> String {
    if let Some(q) = query {
        path.push('?');
        path.push_str(q);
    }
    path
}
