//! Meta-data markers attached to components, content and buttons.
//!
//! The authoring tool locates editable regions through markers placed before
//! (`begin`) and after (`end`) a rendered entity. Only HTML comment markers
//! exist today; their payload may arrive wrapped in `<!-- -->`.

mod collection;

pub use collection::{HtmlFragment, MarkerHost, MetaCollection, NodeId};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SpaError;
use crate::factory::SimpleFactory;

pub const TYPE_META_COMMENT: &str = "comment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaPosition {
    Begin,
    End,
}

/// A single marker as it appears in the page model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaModel {
    #[serde(rename = "type")]
    pub meta_type: String,
    #[serde(default)]
    pub data: String,
}

impl MetaModel {
    pub fn comment(data: impl Into<String>) -> Self {
        MetaModel {
            meta_type: TYPE_META_COMMENT.to_string(),
            data: data.into(),
        }
    }
}

/// The `beginNodeSpan` / `endNodeSpan` pair a collection is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaCollectionModel {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub begin_node_span: Vec<MetaModel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub end_node_span: Vec<MetaModel>,
}

impl MetaCollectionModel {
    /// Reads the spans out of a `meta` / `_meta` object; other keys are ignored.
    pub fn from_value(value: &Value) -> Result<Self, SpaError> {
        let span = |key: &str| -> Result<Vec<MetaModel>, SpaError> {
            match value.get(key) {
                Some(items @ Value::Array(_)) => Ok(serde_json::from_value(items.clone())?),
                _ => Ok(Vec::new()),
            }
        };

        Ok(MetaCollectionModel {
            begin_node_span: span("beginNodeSpan")?,
            end_node_span: span("endNodeSpan")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    Comment,
    /// A marker type registered by the application.
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    kind: MetaKind,
    model: MetaModel,
    position: MetaPosition,
}

/// The payload of a single-line `<!--...-->` comment.
fn comment_payload(data: &str) -> Option<&str> {
    data.strip_prefix("<!--")
        .and_then(|rest| rest.strip_suffix("-->"))
        .filter(|payload| !payload.contains('\n'))
}

impl Meta {
    pub fn comment(model: MetaModel, position: MetaPosition) -> Self {
        Meta {
            kind: MetaKind::Comment,
            model,
            position,
        }
    }

    pub fn custom(model: MetaModel, position: MetaPosition) -> Self {
        Meta {
            kind: MetaKind::Custom,
            model,
            position,
        }
    }

    /// The marker payload; comment delimiters are stripped.
    pub fn data(&self) -> &str {
        match self.kind {
            MetaKind::Comment => comment_payload(&self.model.data).unwrap_or(&self.model.data),
            MetaKind::Custom => &self.model.data,
        }
    }

    pub fn position(&self) -> MetaPosition {
        self.position
    }

    pub fn kind(&self) -> MetaKind {
        self.kind
    }

    pub fn is_comment(&self) -> bool {
        self.kind == MetaKind::Comment
    }

    pub fn model(&self) -> &MetaModel {
        &self.model
    }
}

type MetaBuilder = dyn Fn(MetaModel, MetaPosition) -> Meta + Send + Sync;

/// Builds [`Meta`] markers by their `type`.
#[derive(Debug)]
pub struct MetaFactory {
    factory: SimpleFactory<MetaBuilder>,
}

impl MetaFactory {
    /// A factory without any marker types.
    pub fn empty() -> Self {
        MetaFactory {
            factory: SimpleFactory::new("meta"),
        }
    }

    /// A factory that knows comment markers.
    pub fn new() -> Self {
        Self::empty().register(TYPE_META_COMMENT, Meta::comment)
    }

    pub fn register<F>(mut self, meta_type: &str, builder: F) -> Self
    where
        F: Fn(MetaModel, MetaPosition) -> Meta + Send + Sync + 'static,
    {
        self.factory = self.factory.register(meta_type, Box::new(builder));
        self
    }

    pub fn create(&self, model: MetaModel, position: MetaPosition) -> Result<Meta, SpaError> {
        let builder = self.factory.get(&model.meta_type)?;
        Ok(builder(model, position))
    }

    /// Begin markers first, then end markers, each in model order.
    pub fn create_collection(
        &self,
        model: MetaCollectionModel,
    ) -> Result<MetaCollection, SpaError> {
        let begin = model
            .begin_node_span
            .into_iter()
            .map(|meta| self.create(meta, MetaPosition::Begin));
        let end = model
            .end_node_span
            .into_iter()
            .map(|meta| self.create(meta, MetaPosition::End));

        Ok(MetaCollection::new(begin.chain(end).collect::<Result<_, _>>()?))
    }

    /// Builds a collection from a raw `meta` / `_meta` value; `None` gives an empty one.
    pub fn create_collection_from_value(
        &self,
        value: Option<&Value>,
    ) -> Result<MetaCollection, SpaError> {
        match value {
            Some(value) => self.create_collection(MetaCollectionModel::from_value(value)?),
            None => Ok(MetaCollection::default()),
        }
    }
}

impl Default for MetaFactory {
    fn default() -> Self {
        Self::new()
    }
}
