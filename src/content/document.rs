use std::sync::Arc;

use serde_json::Value;

use super::{text, ContentContext};
use crate::error::SpaError;
use crate::meta::MetaCollection;

static NO_DATA: Value = Value::Null;

#[derive(Debug)]
pub struct Document {
    model: Value,
    meta: Arc<MetaCollection>,
    url: Option<String>,
}

impl Document {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Result<Self, SpaError> {
        Ok(Document {
            meta: context.meta(model.get("meta"))?,
            url: context.url(model, "/links/site"),
            model: model.clone(),
        })
    }

    pub fn id(&self) -> Option<&str> {
        text(&self.model, "/data/id")
    }

    pub fn name(&self) -> Option<&str> {
        text(&self.model, "/data/name")
    }

    pub fn locale(&self) -> Option<&str> {
        text(&self.model, "/data/localeString")
    }

    /// The document fields as delivered by the API.
    pub fn data(&self) -> &Value {
        self.model.get("data").unwrap_or(&NO_DATA)
    }

    pub fn meta(&self) -> &Arc<MetaCollection> {
        &self.meta
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}
