// src/html.rs
// =============================================================================
// The HTML tokenizer adapter: walks an HTML byte stream once, front to back,
// rewriting the handful of link-bearing attributes we care about and
// collecting the links we rewrote - without ever reconstructing a DOM.
//
// We lean on `lol_html`, a streaming rewriter built for exactly this shape of
// problem (see https://github.com/cloudflare/lol-html): it matches elements
// with CSS-style selectors, lets us edit specific attribute spans, and
// passes every other byte straight through. A parse-to-AST-then-reserialize
// approach (e.g. `scraper`/`html5ever` directly) would normalize whitespace,
// entity encoding and self-closing style along the way, which the byte-
// fidelity requirement rules out.
// =============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::html_content::ContentType;
use lol_html::{element, text, HtmlRewriter, Settings};
use url::Url;

use crate::css::rewrite_css;
use crate::error::MirrorError;
use crate::link::{Link, LinkContext};
use crate::url_util::{is_absolute_http, make_relative, strip_fragment};

pub struct HtmlRewrite {
    pub body: String,
    pub base_url: Url,
    pub links: Vec<Link>,
}

/// Rewrites `html` (the body of a page fetched from `page_url`), resolving
/// link-bearing attributes against `page_url` unless a `<base href>` element
/// overrides it partway through the document.
pub fn rewrite_html(html: &str, page_url: &Url) -> Result<HtmlRewrite, MirrorError> {
    let base_url = Rc::new(RefCell::new(page_url.clone()));
    let links = Rc::new(RefCell::new(Vec::<Link>::new()));
    let style_buf = Rc::new(RefCell::new(String::new()));

    let mut output = Vec::with_capacity(html.len());

    {
        let base_for_base_tag = base_url.clone();
        let page_url_for_base_tag = page_url.clone();

        let base_a = base_url.clone();
        let links_a = links.clone();
        let page_url_a = page_url.clone();

        let base_img = base_url.clone();
        let links_img = links.clone();
        let page_url_img = page_url.clone();

        let base_script = base_url.clone();
        let links_script = links.clone();
        let page_url_script = page_url.clone();

        let base_link = base_url.clone();
        let links_link = links.clone();
        let page_url_link = page_url.clone();

        let style_text_buf = style_buf.clone();
        let style_end_buf = style_buf.clone();
        let base_style = base_url.clone();
        let links_style = links.clone();

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("base[href]", move |el| {
                        if let Some(href) = el.get_attribute("href") {
                            let trimmed = href.trim().to_string();
                            if !trimmed.is_empty() {
                                if let Ok(resolved) = page_url_for_base_tag.join(&trimmed) {
                                    *base_for_base_tag.borrow_mut() = resolved;
                                    el.set_attribute("href", ".")?;
                                }
                            }
                        }
                        Ok(())
                    }),
                    element!("a[href]", move |el| {
                        rewrite_link_attribute(
                            el,
                            "href",
                            LinkContext::HtmlTagA,
                            &page_url_a,
                            &base_a.borrow(),
                            &links_a,
                        );
                        Ok(())
                    }),
                    element!("img[src]", move |el| {
                        rewrite_link_attribute(
                            el,
                            "src",
                            LinkContext::HtmlTagImg,
                            &page_url_img,
                            &base_img.borrow(),
                            &links_img,
                        );
                        Ok(())
                    }),
                    element!("script[src]", move |el| {
                        rewrite_link_attribute(
                            el,
                            "src",
                            LinkContext::HtmlTagScript,
                            &page_url_script,
                            &base_script.borrow(),
                            &links_script,
                        );
                        Ok(())
                    }),
                    element!("link[href]", move |el| {
                        let rel = el.get_attribute("rel").unwrap_or_default();
                        let is_stylesheet = rel
                            .split_ascii_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("stylesheet"));
                        if is_stylesheet {
                            rewrite_link_attribute(
                                el,
                                "href",
                                LinkContext::HtmlTagLinkStylesheet,
                                &page_url_link,
                                &base_link.borrow(),
                                &links_link,
                            );
                        }
                        Ok(())
                    }),
                    text!("style", move |chunk| {
                        style_text_buf.borrow_mut().push_str(chunk.as_str());
                        chunk.remove();
                        Ok(())
                    }),
                    element!("style", move |el| {
                        let buf = style_end_buf.clone();
                        let base = base_style.clone();
                        let links = links_style.clone();
                        el.on_end_tag(move |end| {
                            let css = std::mem::take(&mut *buf.borrow_mut());
                            let (rewritten, css_links) = rewrite_css(&css, &base.borrow());
                            links.borrow_mut().extend(css_links);
                            end.before(&rewritten, ContentType::Text);
                            Ok(())
                        })?;
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |chunk: &[u8]| output.extend_from_slice(chunk),
        );

        rewriter
            .write(html.as_bytes())
            .map_err(|e| MirrorError::ParseBody(e.to_string()))?;
        rewriter
            .end()
            .map_err(|e| MirrorError::ParseBody(e.to_string()))?;
    }

    let body = String::from_utf8(output).map_err(|e| MirrorError::ParseBody(e.to_string()))?;
    let base_url = base_url.borrow().clone();
    let links = Rc::try_unwrap(links)
        .map(|cell| cell.into_inner())
        .unwrap_or_default();

    Ok(HtmlRewrite {
        body,
        base_url,
        links,
    })
}

fn rewrite_link_attribute(
    el: &mut lol_html::html_content::Element,
    attr: &str,
    context: LinkContext,
    page_url: &Url,
    base: &Url,
    links: &Rc<RefCell<Vec<Link>>>,
) {
    let Some(value) = el.get_attribute(attr) else {
        return;
    };
    let Some(absolute) = resolve_attr_value(&value, page_url) else {
        return;
    };

    links
        .borrow_mut()
        .push(Link::new(strip_fragment(&absolute), context));

    let relative = make_relative(&absolute, base);
    let _ = el.set_attribute(attr, &relative);
}

/// Resolves an attribute value to an absolute-http URL, or `None` if it
/// isn't one. Protocol-relative values (`//host/path`) inherit the scheme of
/// the originally requested page, per the protocol-relative URL convention.
fn resolve_attr_value(value: &str, page_url: &Url) -> Option<Url> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("//") {
        let candidate = format!("{}://{}", page_url.scheme(), rest);
        return Url::parse(&candidate).ok().filter(is_absolute_http);
    }

    Url::parse(trimmed).ok().filter(is_absolute_http)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_base_href_and_anchor() {
        let page = Url::parse("http://d.com/p").unwrap();
        let html = r#"<base href="/x/y"/><a href="http://d.com/x/z">z</a>"#;
        let result = rewrite_html(html, &page).unwrap();

        assert_eq!(result.base_url.as_str(), "http://d.com/x/y");
        assert!(result.body.contains(r#"<base href="."/>"#));
        assert!(result.body.contains(r#"href="z""#));
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].url.as_str(), "http://d.com/x/z");
        assert_eq!(result.links[0].context, LinkContext::HtmlTagA);
    }

    #[test]
    fn ignores_empty_and_non_http_links() {
        let page = Url::parse("http://d.com/m").unwrap();
        let html = r##"<a href=""/><a href="#x"/><a href="ftp://x"/><img src="data:image/png;base64,AAA"/>"##;
        let result = rewrite_html(html, &page).unwrap();

        assert!(result.links.is_empty());
    }

    #[test]
    fn strips_fragment_from_link_but_keeps_it_in_body() {
        let page = Url::parse("http://d.com/p").unwrap();
        let html = r#"<a href="http://d.com/q#frag"/>"#;
        let result = rewrite_html(html, &page).unwrap();

        assert_eq!(result.links[0].url.as_str(), "http://d.com/q");
        assert!(result.body.contains(r#"href="q#frag""#));
    }

    #[test]
    fn rewrites_stylesheet_link_but_not_other_rel() {
        let page = Url::parse("http://d.com/p").unwrap();
        let html = concat!(
            r#"<link rel="stylesheet" href="http://d.com/a.css"/>"#,
            r#"<link rel="icon" href="http://d.com/favicon.ico"/>"#,
        );
        let result = rewrite_html(html, &page).unwrap();

        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].context, LinkContext::HtmlTagLinkStylesheet);
        assert!(result.body.contains(r#"href="a.css""#));
        assert!(result.body.contains(r#"href="http://d.com/favicon.ico""#));
    }

    #[test]
    fn rewrites_inline_style_urls() {
        let page = Url::parse("http://d.com/p").unwrap();
        let html = r#"<style>body{background:url('http://d.com/bg.png')}</style>"#;
        let result = rewrite_html(html, &page).unwrap();

        assert!(result.body.contains("url('bg.png')"));
        assert_eq!(result.links[0].context, LinkContext::CssUri);
    }

    #[test]
    fn preserves_invalid_markup_byte_for_byte() {
        let page = Url::parse("http://d.com/p").unwrap();
        let html = "<p>Oops</p";
        let result = rewrite_html(html, &page).unwrap();

        assert_eq!(result.body, html);
    }

    #[test]
    fn treats_protocol_relative_as_absolute_http() {
        let page = Url::parse("http://d.com/p").unwrap();
        let html = r#"<img src="//other.com/x.png"/>"#;
        let result = rewrite_html(html, &page).unwrap();

        assert_eq!(result.links[0].url.as_str(), "http://other.com/x.png");
    }
}
