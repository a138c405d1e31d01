use serde_json::Value;

use super::ContentContext;
use crate::reference::Reference;

#[derive(Debug, Clone)]
pub struct PaginationItem {
    number: u64,
    url: Option<String>,
}

impl PaginationItem {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Self {
        PaginationItem {
            number: model.get("number").and_then(Value::as_u64).unwrap_or_default(),
            url: context.url(model, "/links/site"),
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Paging state of a list, with one item per reachable page.
#[derive(Debug)]
pub struct Pagination {
    model: Value,
    current: PaginationItem,
    first: PaginationItem,
    last: PaginationItem,
    next: Option<PaginationItem>,
    previous: Option<PaginationItem>,
    pages: Vec<PaginationItem>,
}

impl Pagination {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Self {
        let item = |key: &str| {
            model
                .get(key)
                .filter(|item| item.is_object())
                .map(|item| PaginationItem::new(item, context))
        };
        let required =
            |key: &str| item(key).unwrap_or_else(|| PaginationItem::new(&Value::Null, context));

        Pagination {
            current: required("current"),
            first: required("first"),
            last: required("last"),
            next: item("next"),
            previous: item("previous"),
            pages: model
                .get("pages")
                .and_then(Value::as_array)
                .map(|pages| pages.iter().map(|page| PaginationItem::new(page, context)).collect())
                .unwrap_or_default(),
            model: model.clone(),
        }
    }

    pub fn current(&self) -> &PaginationItem {
        &self.current
    }

    pub fn first(&self) -> &PaginationItem {
        &self.first
    }

    pub fn last(&self) -> &PaginationItem {
        &self.last
    }

    pub fn next(&self) -> Option<&PaginationItem> {
        self.next.as_ref()
    }

    pub fn previous(&self) -> Option<&PaginationItem> {
        self.previous.as_ref()
    }

    pub fn pages(&self) -> &[PaginationItem] {
        &self.pages
    }

    /// References to the items on the current page.
    pub fn items(&self) -> Vec<Reference> {
        self.model
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Reference::from_value).collect())
            .unwrap_or_default()
    }

    pub fn offset(&self) -> u64 {
        self.number("offset")
    }

    pub fn size(&self) -> u64 {
        self.number("size")
    }

    pub fn total(&self) -> u64 {
        self.number("total")
    }

    pub fn is_enabled(&self) -> bool {
        self.model
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn number(&self, key: &str) -> u64 {
        self.model.get(key).and_then(Value::as_u64).unwrap_or_default()
    }
}
