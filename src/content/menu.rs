use std::sync::Arc;

use serde_json::{Map, Value};

use super::{text, ContentContext};
use crate::error::SpaError;
use crate::link::Link;
use crate::meta::MetaCollection;

#[derive(Debug, Clone)]
pub struct MenuItem {
    model: Value,
    url: Option<String>,
    children: Vec<MenuItem>,
}

impl MenuItem {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Self {
        MenuItem {
            url: context.url(model, "/links/site"),
            children: items(model.get("childMenuItems"), context),
            model: model.clone(),
        }
    }

    pub fn children(&self) -> &[MenuItem] {
        &self.children
    }

    pub fn depth(&self) -> u64 {
        self.model.get("depth").and_then(Value::as_u64).unwrap_or_default()
    }

    pub fn link(&self) -> Option<Link> {
        self.model.pointer("/links/site").and_then(Link::from_value)
    }

    pub fn name(&self) -> Option<&str> {
        text(&self.model, "/name")
    }

    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.model.get("parameters").and_then(Value::as_object)
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_expanded(&self) -> bool {
        flag(&self.model, "expanded")
    }

    pub fn is_repository_based(&self) -> bool {
        flag(&self.model, "repositoryBased")
    }

    pub fn is_selected(&self) -> bool {
        flag(&self.model, "selected")
    }
}

fn flag(model: &Value, key: &str) -> bool {
    model.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn items(models: Option<&Value>, context: &ContentContext<'_>) -> Vec<MenuItem> {
    models
        .and_then(Value::as_array)
        .map(|models| models.iter().map(|item| MenuItem::new(item, context)).collect())
        .unwrap_or_default()
}

#[derive(Debug)]
pub struct Menu {
    model: Value,
    items: Vec<MenuItem>,
    selected: Option<MenuItem>,
    meta: Arc<MetaCollection>,
}

impl Menu {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Result<Self, SpaError> {
        Ok(Menu {
            items: items(model.pointer("/data/siteMenuItems"), context),
            selected: model
                .pointer("/data/selectSiteMenuItem")
                .filter(|item| item.is_object())
                .map(|item| MenuItem::new(item, context)),
            meta: context.meta(model.get("meta"))?,
            model: model.clone(),
        })
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn name(&self) -> Option<&str> {
        text(&self.model, "/data/name")
    }

    pub fn selected(&self) -> Option<&MenuItem> {
        self.selected.as_ref()
    }

    pub fn meta(&self) -> &Arc<MetaCollection> {
        &self.meta
    }
}
