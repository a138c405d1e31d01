//! Component tree assembly for both page model shapes.
//!
//! Neither builder recurses, so deep trees cannot exhaust the stack.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::component::{Component, ComponentFactory};
use crate::error::SpaError;
use crate::reference::{resolve, Reference};

struct Discovered {
    reference: Reference,
    parent: Option<usize>,
}

fn child_references(model: &Value) -> impl Iterator<Item = Reference> + '_ {
    model
        .get("children")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Reference::from_value)
}

/// Builds the tree of a flat (1.0) model starting at its `root` reference.
///
/// Components are enumerated breadth-first and then built in reverse
/// discovery order, so every child exists before its parent. Children that
/// do not resolve are left out. A reference back to one of its own ancestors
/// is not followed.
pub fn build_referenced(
    factory: &ComponentFactory,
    document: &Value,
) -> Result<Option<Arc<Component>>, SpaError> {
    let Some(root) = document.get("root").and_then(Reference::from_value) else {
        return Ok(None);
    };

    let mut heap = vec![Discovered {
        reference: root.clone(),
        parent: None,
    }];
    let mut index = 0;
    while index < heap.len() {
        if let Some(model) = resolve(document, &heap[index].reference) {
            for child in child_references(model) {
                if !is_ancestor(&heap, index, &child) {
                    heap.push(Discovered {
                        reference: child,
                        parent: Some(index),
                    });
                }
            }
        }
        index += 1;
    }

    let mut pool: HashMap<String, Arc<Component>> = HashMap::new();
    for Discovered { reference, .. } in heap.iter().rev() {
        let Some(model) = resolve(document, reference) else {
            continue;
        };
        let children = child_references(model)
            .filter_map(|child| pool.get(&child.key()).cloned())
            .collect();
        let component = factory.build(model.clone(), children)?;
        pool.insert(reference.key(), component);
    }

    Ok(pool.remove(&root.key()))
}

fn is_ancestor(heap: &[Discovered], mut index: usize, reference: &Reference) -> bool {
    let key = reference.key();
    loop {
        if heap[index].reference.key() == key {
            return true;
        }
        match heap[index].parent {
            Some(parent) => index = parent,
            None => return false,
        }
    }
}

struct Frame<'m> {
    model: &'m Value,
    children: Option<Vec<Arc<Component>>>,
    parent: Option<usize>,
}

/// Builds the tree of a nested (0.9) model.
///
/// A frame with nested `components` is expanded once: its children are
/// queued ahead of it and append themselves to its child list as they are
/// built. The root is the last component built.
pub fn build_nested(factory: &ComponentFactory, root: &Value) -> Result<Arc<Component>, SpaError> {
    let mut frames = vec![Frame {
        model: root,
        children: None,
        parent: None,
    }];
    let mut queue = vec![0];
    let mut component = None;

    while let Some(index) = queue.pop() {
        let model = frames[index].model;
        let nested = model
            .get("components")
            .and_then(Value::as_array)
            .filter(|components| !components.is_empty());

        if let (None, Some(nested)) = (&frames[index].children, nested) {
            frames[index].children = Some(Vec::with_capacity(nested.len()));
            queue.push(index);
            for child in nested.iter().rev() {
                frames.push(Frame {
                    model: child,
                    children: None,
                    parent: Some(index),
                });
                queue.push(frames.len() - 1);
            }
            continue;
        }

        let children = frames[index].children.take().unwrap_or_default();
        let built = factory.build(without_components(model), children)?;
        if let Some(parent) = frames[index].parent {
            frames[parent]
                .children
                .get_or_insert_with(Vec::new)
                .push(Arc::clone(&built));
        }
        component = Some(built);
    }

    component.ok_or_else(|| SpaError::Decode("empty component model".to_string()))
}

/// A component's own model; nested components live in the tree instead.
fn without_components(model: &Value) -> Value {
    match model.as_object() {
        Some(object) => Value::Object(
            object
                .iter()
                .filter(|(key, _)| key.as_str() != "components")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        None => model.clone(),
    }
}
