//! A keyed registry of entity builders.
//!
//! Every factory in the crate (links, meta-data, buttons, content, components)
//! is a `SimpleFactory` over its own builder signature. Registration uses the
//! builder pattern and returns `self` for chaining.

use std::collections::HashMap;
use std::fmt;

use crate::error::SpaError;

pub struct SimpleFactory<B: ?Sized> {
    kind: &'static str,
    mapping: HashMap<String, Box<B>>,
}

impl<B: ?Sized> SimpleFactory<B> {
    /// `kind` names the entity family in "unsupported type" errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            mapping: HashMap::new(),
        }
    }

    /// Registers a builder, replacing any previous one for the same type.
    pub fn register(mut self, type_name: impl Into<String>, builder: Box<B>) -> Self {
        self.mapping.insert(type_name.into(), builder);
        self
    }

    /// Looks up the builder for `type_name`.
    pub fn get(&self, type_name: &str) -> Result<&B, SpaError> {
        self.mapping
            .get(type_name)
            .map(Box::as_ref)
            .ok_or_else(|| SpaError::unsupported_type(self.kind, type_name))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.mapping.contains_key(type_name)
    }

    pub fn types(&self) -> Vec<&str> {
        self.mapping.keys().map(|s| s.as_str()).collect()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl<B: ?Sized> fmt::Debug for SimpleFactory<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types = self.types();
        types.sort_unstable();
        f.debug_struct("SimpleFactory")
            .field("kind", &self.kind)
            .field("types", &types)
            .finish()
    }
}
