// src/css.rs
// =============================================================================
// Locates `url(...)` occurrences in a CSS byte stream (single-quoted,
// double-quoted, or unquoted) and rewrites the absolute-http ones in place,
// preserving the original quoting style and every byte we don't touch.
//
// We use `regex` rather than a full CSS parser: the spec only asks us to
// find `url(...)` tokens, not to understand selectors or declarations, and a
// regex scan lets us edit the original string byte-for-byte the same way the
// HTML adapter does.
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::link::{Link, LinkContext};
use crate::url_util::{is_absolute_http, make_relative, strip_fragment};

static URL_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:'([^']*)'|"([^"]*)"|([^'"\s)][^)]*?))\s*\)"#)
        .expect("static CSS url() regex is valid")
});

/// Rewrites every absolute-http `url(...)` value in `css`, resolving against
/// `base`. Returns the rewritten CSS text and the links discovered, in the
/// order they appear.
pub fn rewrite_css(css: &str, base: &Url) -> (String, Vec<Link>) {
    let mut out = String::with_capacity(css.len());
    let mut links = Vec::new();
    let mut last_end = 0;

    for caps in URL_FN.captures_iter(css) {
        let whole = caps.get(0).unwrap();
        out.push_str(&css[last_end..whole.start()]);

        let (quote, value) = if let Some(m) = caps.get(1) {
            (Some('\''), m.as_str())
        } else if let Some(m) = caps.get(2) {
            (Some('"'), m.as_str())
        } else {
            (None, caps.get(3).map(|m| m.as_str()).unwrap_or(""))
        };

        match resolve_css_value(value, base) {
            Some((absolute, rewritten_value)) => {
                links.push(Link::new(strip_fragment(&absolute), LinkContext::CssUri));
                write_url_fn(&mut out, quote, &rewritten_value);
            }
            None => out.push_str(whole.as_str()),
        }

        last_end = whole.end();
    }
    out.push_str(&css[last_end..]);

    (out, links)
}

fn resolve_css_value(value: &str, base: &Url) -> Option<(Url, String)> {
    let trimmed = value.trim();
    let absolute = Url::parse(trimmed).ok().filter(is_absolute_http)?;
    let rewritten = make_relative(&absolute, base);
    Some((absolute, rewritten))
}

fn write_url_fn(out: &mut String, quote: Option<char>, value: &str) {
    out.push_str("url(");
    if let Some(q) = quote {
        out.push(q);
        out.push_str(value);
        out.push(q);
    } else {
        out.push_str(value);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_single_quoted_url() {
        let base = Url::parse("http://domain.com/download/urls/css/url").unwrap();
        let css = "body{background:url('http://domain.com/download/urls/css/target')}";
        let (rewritten, links) = rewrite_css(css, &base);
        assert_eq!(rewritten, "body{background:url('target')}");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].context, LinkContext::CssUri);
    }

    #[test]
    fn rewrites_double_quoted_url() {
        let base = Url::parse("http://d.com/p").unwrap();
        let css = r#"body{background:url("http://d.com/q")}"#;
        let (rewritten, links) = rewrite_css(css, &base);
        assert_eq!(rewritten, r#"body{background:url("q")}"#);
        assert_eq!(links[0].url.as_str(), "http://d.com/q");
    }

    #[test]
    fn rewrites_unquoted_url() {
        let base = Url::parse("http://d.com/p").unwrap();
        let css = "body{background:url(http://d.com/q)}";
        let (rewritten, _links) = rewrite_css(css, &base);
        assert_eq!(rewritten, "body{background:url(q)}");
    }

    #[test]
    fn leaves_data_uri_untouched() {
        let base = Url::parse("http://d.com/p").unwrap();
        let css = "body{background:url(data:image/png;base64,AAAA)}";
        let (rewritten, links) = rewrite_css(css, &base);
        assert_eq!(rewritten, css);
        assert!(links.is_empty());
    }

    #[test]
    fn tolerates_whitespace_after_url_paren() {
        let base = Url::parse("http://d.com/p").unwrap();
        let css = "body{background:url(  'http://d.com/q'  )}";
        let (rewritten, links) = rewrite_css(css, &base);
        assert_eq!(rewritten, "body{background:url('q')}");
        assert_eq!(links.len(), 1);
    }
}
