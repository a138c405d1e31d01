//! Rewrites CMS links inside rich-text markup.
//!
//! Anchors carrying both `href` and `data-type` go through the link factory
//! with that type; image sources are treated as resource links. Everything
//! else in the markup is left byte-for-byte intact.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use regex::{Captures, Regex};

use crate::link::{Link, LinkFactory, LinkType};

pub const CONTENT_TYPE_HTML: &str = "text/html";

fn attribute_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#,
            )
            .ok()
        })
        .as_ref()
}

/// A start tag found in markup, as a byte range plus its name.
struct Tag<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

/// Finds start tags in `content`, skipping comments and honouring quoted
/// attribute values when looking for the closing `>`.
fn start_tags(content: &str) -> Vec<Tag<'_>> {
    let bytes = content.as_bytes();
    let mut tags = Vec::new();
    let mut at = 0;

    while let Some(offset) = content[at..].find('<') {
        let start = at + offset;
        let rest = &content[start..];
        if rest.starts_with("<!--") {
            at = match rest[4..].find("-->") {
                Some(close) => start + 4 + close + 3,
                None => content.len(),
            };
            continue;
        }

        let name_len = rest[1..]
            .bytes()
            .take_while(|byte| byte.is_ascii_alphanumeric())
            .count();
        if name_len == 0 || !rest.as_bytes()[1].is_ascii_alphabetic() {
            at = start + 1;
            continue;
        }

        let mut quote = None;
        let mut end = None;
        for (index, &byte) in bytes.iter().enumerate().skip(start + 1 + name_len) {
            match (quote, byte) {
                (Some(open), _) if byte == open => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(byte),
                (None, b'>') => {
                    end = Some(index + 1);
                    break;
                }
                _ => {}
            }
        }
        let Some(end) = end else {
            break;
        };
        tags.push(Tag {
            start,
            end,
            name: &rest[1..1 + name_len],
        });
        at = end;
    }
    tags
}

#[derive(Debug, Clone)]
pub struct LinkRewriter {
    links: Arc<LinkFactory>,
}

impl LinkRewriter {
    pub fn new(links: Arc<LinkFactory>) -> Self {
        LinkRewriter { links }
    }

    /// Rewrites anchors and images in `content`. Tag names are matched
    /// case-insensitively only for `text/html`. Comments are left alone.
    pub fn rewrite(&self, content: &str, content_type: &str) -> String {
        let Some(pattern) = attribute_pattern() else {
            return content.to_string();
        };
        let html = content_type == CONTENT_TYPE_HTML;
        let is = |name: &str, expected: &str| {
            if html {
                name.eq_ignore_ascii_case(expected)
            } else {
                name == expected
            }
        };

        let mut output = String::with_capacity(content.len());
        let mut copied = 0;
        for tag in start_tags(content) {
            let markup = &content[tag.start..tag.end];
            let rewritten = if is(tag.name, "a") {
                self.rewrite_tag(markup, pattern, "href", |attributes| {
                    let link_type = attribute(attributes, "data-type")?;
                    Some(Link {
                        href: None,
                        link_type: LinkType::from_name(&link_type),
                    })
                })
            } else if is(tag.name, "img") {
                self.rewrite_tag(markup, pattern, "src", |_| {
                    Some(Link {
                        href: None,
                        link_type: Some(LinkType::Resource),
                    })
                })
            } else {
                continue;
            };
            output.push_str(&content[copied..tag.start]);
            output.push_str(&rewritten);
            copied = tag.end;
        }
        output.push_str(&content[copied..]);
        output
    }

    fn rewrite_tag(
        &self,
        tag: &str,
        attribute_pattern: &Regex,
        target: &str,
        link: impl Fn(&[(String, String)]) -> Option<Link>,
    ) -> String {
        let attributes: Vec<(String, String)> = attribute_pattern
            .captures_iter(tag)
            .map(|captures| {
                let value = captures
                    .get(2)
                    .or_else(|| captures.get(3))
                    .or_else(|| captures.get(4))
                    .map_or("", |value| value.as_str());
                (captures[1].to_string(), decode(value).into_owned())
            })
            .collect();

        let Some(href) = attribute(&attributes, target) else {
            return tag.to_string();
        };
        let Some(mut link) = link(&attributes) else {
            return tag.to_string();
        };
        link.href = Some(href.clone());

        match self.links.create(&link) {
            Some(url) if url != href => attribute_pattern
                .replace_all(tag, |captures: &Captures| {
                    if captures[1].eq_ignore_ascii_case(target) {
                        format!("{}=\"{}\"", &captures[1], encode(&url))
                    } else {
                        captures[0].to_string()
                    }
                })
                .into_owned(),
            _ => tag.to_string(),
        }
    }
}

fn attribute(attributes: &[(String, String)], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.clone())
}

fn decode(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

fn encode(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> LinkRewriter {
        LinkRewriter::new(Arc::new(
            LinkFactory::new()
                .register(LinkType::Internal, |href| format!("/spa{}", href))
                .register(LinkType::Resource, |href| format!("http://cms{}", href)),
        ))
    }

    #[test]
    fn rewrites_typed_anchors() {
        let html = r#"<p><a href="/news" data-type="internal">News</a> <a href="/x">plain</a></p>"#;
        assert_eq!(
            rewriter().rewrite(html, CONTENT_TYPE_HTML),
            r#"<p><a href="/spa/news" data-type="internal">News</a> <a href="/x">plain</a></p>"#
        );
    }

    #[test]
    fn rewrites_image_sources() {
        let html = r#"<IMG alt='logo' SRC='/binaries/logo.png'/>"#;
        assert_eq!(
            rewriter().rewrite(html, CONTENT_TYPE_HTML),
            r#"<IMG alt='logo' SRC="http://cms/binaries/logo.png"/>"#
        );
    }

    #[test]
    fn xml_mode_is_case_sensitive() {
        let xml = r#"<IMG src="/a.png"/><img src="/b.png"/>"#;
        assert_eq!(
            rewriter().rewrite(xml, "application/xhtml+xml"),
            r#"<IMG src="/a.png"/><img src="http://cms/b.png"/>"#
        );
    }

    #[test]
    fn unquoted_attributes_are_read() {
        let html = "<a href=/news data-type=internal>x</a>";
        assert_eq!(
            rewriter().rewrite(html, CONTENT_TYPE_HTML),
            r#"<a href="/spa/news" data-type=internal>x</a>"#
        );
    }

    #[test]
    fn quoted_angle_brackets_stay_inside_the_tag() {
        let html = r#"<a title="a>b" href="/news" data-type="internal">x</a>"#;
        assert_eq!(
            rewriter().rewrite(html, CONTENT_TYPE_HTML),
            r#"<a title="a>b" href="/spa/news" data-type="internal">x</a>"#
        );
    }

    #[test]
    fn comments_are_left_alone() {
        let html = r#"<!-- <a href="/news" data-type="internal"> --><img src="/a.png">"#;
        assert_eq!(
            rewriter().rewrite(html, CONTENT_TYPE_HTML),
            r#"<!-- <a href="/news" data-type="internal"> --><img src="http://cms/a.png">"#
        );
    }

    #[test]
    fn entities_survive() {
        let html = r#"<a data-type="internal" href="/search?a=1&amp;b=2">s</a>"#;
        assert_eq!(
            rewriter().rewrite(html, CONTENT_TYPE_HTML),
            r#"<a data-type="internal" href="/spa/search?a=1&amp;b=2">s</a>"#
        );
    }
}
