// src/link.rs
// =============================================================================
// The data model shared by the downloader, the HTML/CSS rewriters, and the
// crawler: a `Link` is an absolute-http, fragment-stripped URL plus the kind
// of markup it was found in.
// =============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

/// Where a `Link` was found. Closed set, not an open string, per the design
/// note in the specification - callers match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkContext {
    HtmlTagA,
    HtmlTagImg,
    HtmlTagScript,
    HtmlTagLinkStylesheet,
    CssUri,
    Http3xxLocation,
}

/// An outbound link discovered while downloading a page: an absolute
/// http(s) URL with its fragment stripped, tagged with the markup it came
/// from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: Url,
    pub context: LinkContext,
}

impl Link {
    pub fn new(url: Url, context: LinkContext) -> Self {
        Self { url, context }
    }
}
