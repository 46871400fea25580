// src/downloader.rs
// =============================================================================
// One-shot fetch + parse + rewrite for a single URL.
//
// `download` is stateless and side-effect-free beyond the network call
// itself: given a client and a URL it always produces a `Downloaded` record,
// success or failure, and never retries or follows redirects on its own -
// the caller's `Client` must be built with `redirect::Policy::none()` so
// that 3xx `Location` headers stay observable.
// =============================================================================

use reqwest::Client;
use url::Url;

use crate::css::rewrite_css;
use crate::error::MirrorError;
use crate::html::rewrite_html;
use crate::link::{Link, LinkContext};
use crate::url_util::{is_absolute_http, resolve, strip_fragment};

/// The result of fetching one URL: either a populated response envelope, or
/// `error` set with every other field at its zero value (except `url`,
/// which Rust's type system lets us keep even on failure since the caller
/// always supplies a well-formed `Url`).
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub url: Url,
    pub base_url: Url,
    pub status_code: u16,
    pub content_type: String,
    pub header_location: Option<Url>,
    pub body_bytes: Vec<u8>,
    pub body_string: String,
    pub links: Vec<Link>,
    pub error: Option<MirrorError>,
}

impl Downloaded {
    fn invalid(url: Url, error: MirrorError) -> Self {
        Downloaded {
            base_url: url.clone(),
            url,
            status_code: 0,
            content_type: String::new(),
            header_location: None,
            body_bytes: Vec::new(),
            body_string: String::new(),
            links: Vec::new(),
            error: Some(error),
        }
    }

    /// Resolves `links[i].url` against `base_url`, or `None` out of range.
    pub fn resolved_url(&self, i: usize) -> Option<Url> {
        self.links.get(i).and_then(|link| resolve(&self.base_url, link.url.as_str()).ok())
    }

    pub fn len_links(&self) -> usize {
        self.links.len()
    }

    /// Iterates over every link paired with its URL resolved against
    /// `base_url`, skipping any that fail to resolve.
    pub fn resolved_links(&self) -> impl Iterator<Item = (&Link, Url)> + '_ {
        self.links
            .iter()
            .filter_map(move |link| resolve(&self.base_url, link.url.as_str()).ok().map(|url| (link, url)))
    }
}

/// Fetches `url` with `client`, classifies the body by content type, and -
/// for HTML and CSS - rewrites it in place while collecting outbound links.
pub async fn download(client: &Client, url: &Url) -> Downloaded {
    if !is_absolute_http(url) {
        return Downloaded::invalid(
            url.clone(),
            MirrorError::InputInvalid(format!("not an absolute http(s) url: {url}")),
        );
    }

    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return Downloaded::invalid(url.clone(), MirrorError::Transport(e.to_string())),
    };

    let status_code = response.status().as_u16();
    let content_type = media_type(response.headers());
    let header_location = parse_location(response.headers(), url);

    let body = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return Downloaded::invalid(url.clone(), MirrorError::Transport(e.to_string())),
    };

    let mut downloaded = Downloaded {
        base_url: url.clone(),
        url: url.clone(),
        status_code,
        content_type: content_type.clone(),
        header_location: header_location.clone(),
        body_bytes: Vec::new(),
        body_string: String::new(),
        links: Vec::new(),
        error: None,
    };

    match content_type.as_str() {
        "text/html" => match std::str::from_utf8(&body) {
            Ok(text) => match rewrite_html(text, url) {
                Ok(rewrite) => {
                    downloaded.base_url = rewrite.base_url;
                    downloaded.body_string = rewrite.body;
                    downloaded.links = rewrite.links;
                }
                Err(_) => downloaded.body_bytes = body.to_vec(),
            },
            Err(_) => downloaded.body_bytes = body.to_vec(),
        },
        "text/css" => match std::str::from_utf8(&body) {
            Ok(text) => {
                let (rewritten, links) = rewrite_css(text, url);
                downloaded.body_string = rewritten;
                downloaded.links = links;
            }
            Err(_) => downloaded.body_bytes = body.to_vec(),
        },
        _ => downloaded.body_bytes = body.to_vec(),
    }

    if (300..400).contains(&status_code) {
        if let Some(location) = &header_location {
            downloaded
                .links
                .push(Link::new(strip_fragment(location), LinkContext::Http3xxLocation));
        }
    }

    downloaded
}

fn media_type(headers: &reqwest::header::HeaderMap) -> String {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase()
        })
        .unwrap_or_default()
}

fn parse_location(headers: &reqwest::header::HeaderMap, requested: &Url) -> Option<Url> {
    let raw = headers.get(reqwest::header::LOCATION)?.to_str().ok()?;
    requested.join(raw).ok().filter(is_absolute_http)
}
