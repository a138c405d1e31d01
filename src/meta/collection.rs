use std::fmt;
use std::sync::{Mutex, PoisonError};

use super::{Meta, MetaPosition};

/// Identifies a node owned by a [`MarkerHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// The document that comment markers are rendered into.
pub trait MarkerHost {
    /// Inserts a comment right before `anchor`; `None` if the anchor is detached.
    fn insert_before(&mut self, anchor: NodeId, comment: &str) -> Option<NodeId>;

    /// Inserts a comment right after `anchor`; `None` if the anchor is detached.
    fn insert_after(&mut self, anchor: NodeId, comment: &str) -> Option<NodeId>;

    fn remove(&mut self, node: NodeId);
}

/// An ordered, immutable sequence of markers that can be rendered around a
/// range of host nodes and removed again.
#[derive(Debug, Default)]
pub struct MetaCollection {
    items: Vec<Meta>,
    rendered: Mutex<Vec<NodeId>>,
}

impl MetaCollection {
    pub fn new(items: Vec<Meta>) -> Self {
        MetaCollection {
            items,
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Meta> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Meta> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn comments(&self, position: MetaPosition) -> impl DoubleEndedIterator<Item = &Meta> {
        self.items
            .iter()
            .filter(move |meta| meta.is_comment() && meta.position() == position)
    }

    /// Places begin markers before `head` and end markers after `tail`,
    /// keeping model order on both sides. Returns the created markers.
    pub fn render(&self, host: &mut dyn MarkerHost, head: NodeId, tail: NodeId) -> Vec<NodeId> {
        let mut created: Vec<NodeId> = self
            .comments(MetaPosition::Begin)
            .filter_map(|meta| host.insert_before(head, meta.data()))
            .collect();
        created.extend(
            self.comments(MetaPosition::End)
                .rev()
                .filter_map(|meta| host.insert_after(tail, meta.data())),
        );

        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(created.iter().copied());
        created
    }

    /// Removes the given markers, or every rendered marker when `markers` is `None`.
    ///
    /// Markers that were already removed are skipped.
    pub fn clear(&self, host: &mut dyn MarkerHost, markers: Option<&[NodeId]>) {
        let mut rendered = self.rendered.lock().unwrap_or_else(PoisonError::into_inner);
        let targets: Vec<NodeId> = match markers {
            Some(markers) => markers.to_vec(),
            None => rendered.clone(),
        };

        for marker in targets {
            if let Some(index) = rendered.iter().position(|node| *node == marker) {
                host.remove(marker);
                rendered.remove(index);
            }
        }
    }

    pub fn rendered(&self) -> Vec<NodeId> {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<'a> IntoIterator for &'a MetaCollection {
    type Item = &'a Meta;
    type IntoIter = std::slice::Iter<'a, Meta>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FragmentNode {
    Markup(String),
    Comment(String),
}

/// A flat list of markup chunks; the simplest [`MarkerHost`].
#[derive(Debug, Clone, Default)]
pub struct HtmlFragment {
    nodes: Vec<(NodeId, FragmentNode)>,
    next_id: u64,
}

impl HtmlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of markup and returns its node id.
    pub fn push(&mut self, markup: impl Into<String>) -> NodeId {
        let id = self.allocate();
        self.nodes.push((id, FragmentNode::Markup(markup.into())));
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    fn index_of(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|(id, _)| *id == node)
    }

    fn insert_at(&mut self, index: usize, comment: &str) -> NodeId {
        let id = self.allocate();
        self.nodes
            .insert(index, (id, FragmentNode::Comment(comment.to_string())));
        id
    }
}

impl MarkerHost for HtmlFragment {
    fn insert_before(&mut self, anchor: NodeId, comment: &str) -> Option<NodeId> {
        let index = self.index_of(anchor)?;
        Some(self.insert_at(index, comment))
    }

    fn insert_after(&mut self, anchor: NodeId, comment: &str) -> Option<NodeId> {
        let index = self.index_of(anchor)?;
        Some(self.insert_at(index + 1, comment))
    }

    fn remove(&mut self, node: NodeId) {
        if let Some(index) = self.index_of(node) {
            self.nodes.remove(index);
        }
    }
}

impl fmt::Display for HtmlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, node) in &self.nodes {
            match node {
                FragmentNode::Markup(markup) => f.write_str(markup)?,
                FragmentNode::Comment(comment) => write!(f, "<!--{}-->", comment)?,
            }
        }
        Ok(())
    }
}
