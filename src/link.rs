//! Links in the page model and their translation into SPA URLs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::factory::SimpleFactory;
use crate::url::UrlBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    External,
    Internal,
    Resource,
    Unknown,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::External => "external",
            LinkType::Internal => "internal",
            LinkType::Resource => "resource",
            LinkType::Unknown => "unknown",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "external" => Some(LinkType::External),
            "internal" => Some(LinkType::Internal),
            "resource" => Some(LinkType::Resource),
            "unknown" => Some(LinkType::Unknown),
            _ => None,
        }
    }
}

/// `{ href, type }`; a link without `href` is unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
}

impl Link {
    pub fn new(href: impl Into<String>, link_type: LinkType) -> Self {
        Link {
            href: Some(href.into()),
            link_type: Some(link_type),
        }
    }

    pub fn internal(href: impl Into<String>) -> Self {
        Self::new(href, LinkType::Internal)
    }

    /// Reads a link out of a model value, if it looks like one.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !is_link(value) {
            return None;
        }
        Some(Link {
            href: value.get("href").and_then(Value::as_str).map(str::to_string),
            link_type: value
                .get("type")
                .and_then(Value::as_str)
                .and_then(LinkType::from_name),
        })
    }
}

/// A value is a link if it has an `href`, or a `type` naming a link type.
pub fn is_link(value: &Value) -> bool {
    match value.as_object() {
        Some(object) => {
            object.contains_key("href")
                || object
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(LinkType::from_name)
                    .is_some()
        }
        None => false,
    }
}

type LinkBuilder = dyn Fn(&str) -> String + Send + Sync;

/// Turns links into URLs using one builder per link type.
///
/// Links of unregistered types are passed through as their raw `href`.
#[derive(Debug)]
pub struct LinkFactory {
    factory: SimpleFactory<LinkBuilder>,
}

impl LinkFactory {
    pub fn new() -> Self {
        LinkFactory {
            factory: SimpleFactory::new("link"),
        }
    }

    /// The factory both page model variants use: internal links map to SPA URLs.
    pub fn for_url_builder(url_builder: Arc<dyn UrlBuilder>) -> Self {
        Self::new().register(LinkType::Internal, move |href| url_builder.get_spa_url(href))
    }

    pub fn register<F>(mut self, link_type: LinkType, builder: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.factory = self.factory.register(link_type.as_str(), Box::new(builder));
        self
    }

    pub fn create(&self, link: &Link) -> Option<String> {
        let href = link.href.as_deref()?;
        let builder = link
            .link_type
            .and_then(|link_type| self.factory.get(link_type.as_str()).ok());

        Some(match builder {
            Some(builder) => builder(href),
            None => href.to_string(),
        })
    }

    /// A plain path is treated as an internal link.
    pub fn create_path(&self, path: &str) -> Option<String> {
        self.create(&Link::internal(path))
    }
}

impl Default for LinkFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn factory() -> LinkFactory {
        LinkFactory::new().register(LinkType::Internal, |href| format!("/spa{}", href))
    }

    #[test]
    fn internal_links_use_builder() {
        assert_eq!(factory().create(&Link::internal("/news")), Some("/spa/news".into()));
        assert_eq!(factory().create_path("/news"), Some("/spa/news".into()));
    }

    #[test]
    fn other_links_pass_through() {
        let link = Link::new("http://example.org", LinkType::External);
        assert_eq!(factory().create(&link), Some("http://example.org".into()));

        let untyped = Link {
            href: Some("/raw".into()),
            link_type: None,
        };
        assert_eq!(factory().create(&untyped), Some("/raw".into()));
    }

    #[test]
    fn missing_href_is_unresolved() {
        let link = Link {
            href: None,
            link_type: Some(LinkType::Internal),
        };
        assert_eq!(factory().create(&link), None);
    }

    #[test]
    fn recognises_links() {
        assert!(is_link(&json!({ "href": "/x" })));
        assert!(is_link(&json!({ "type": "unknown" })));
        assert!(!is_link(&json!({ "type": "document" })));
        assert!(!is_link(&json!("/x")));

        let link = Link::from_value(&json!({ "href": "/x", "type": "resource" })).unwrap();
        assert_eq!(link, Link::new("/x", LinkType::Resource));
    }
}
