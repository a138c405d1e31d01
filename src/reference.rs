//! JSON-pointer style references inside a page model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A `{ "$ref": "/page/uid" }` pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl Reference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// Reads a reference out of a model value.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .get("$ref")
            .and_then(Value::as_str)
            .filter(|reference| !reference.is_empty())
            .map(Self::new)
    }

    /// Non-empty path segments; two references with the same key address the same model.
    pub fn key(&self) -> String {
        self.segments().collect::<Vec<_>>().join("/")
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.reference.split('/').filter(|segment| !segment.is_empty())
    }
}

/// Checks whether a value carries a non-empty `$ref` string.
pub fn is_reference(value: &Value) -> bool {
    Reference::from_value(value).is_some()
}

/// Follows `reference` from the document root; a missing key yields `None`.
pub fn resolve<'a>(document: &'a Value, reference: &Reference) -> Option<&'a Value> {
    reference
        .segments()
        .try_fold(document, |value, key| match value {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
