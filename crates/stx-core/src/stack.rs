//! The ancestor stack: every node that is currently open, root first.
//!
//! The streaming driver pushes an entry when a node opens and pops it when the node closes.
//! Text, comment and processing-instruction events are pushed for the duration of their
//! processing, attribute entries while an element's attributes are being visited.
//! Each entry counts the children it has seen so far per [`PositionKey`], which answers
//! "what is the position of this node among its preceding siblings of the same name/kind"
//! without remembering the siblings themselves.
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::model::{Attribute, Event, NodeKind, NodeRef};
use crate::xdm::ExpandedName;

/// Sibling class used for position counting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PositionKey {
    AnyNode,
    AnyElement,
    Element(ExpandedName),
    ElementNs(String),
    ElementLocal(String),
    /// text and cdata together
    Text,
    CData,
    Comment,
    AnyProcessingInstruction,
    ProcessingInstruction(String),
}

impl PositionKey {
    /// Every class a child event belongs to.
    fn keys_for(event: &Event) -> SmallVec<[PositionKey; 5]> {
        let mut keys = SmallVec::new();
        match event.kind() {
            NodeKind::Document | NodeKind::Attribute => return keys,
            NodeKind::Element => {
                keys.push(PositionKey::AnyElement);
                if let Some(name) = event.name() {
                    keys.push(PositionKey::Element(name.clone()));
                    keys.push(PositionKey::ElementNs(name.ns_uri().to_string()));
                    keys.push(PositionKey::ElementLocal(name.local.clone()));
                }
            }
            NodeKind::Text => keys.push(PositionKey::Text),
            NodeKind::CData => {
                keys.push(PositionKey::Text);
                keys.push(PositionKey::CData);
            }
            NodeKind::Comment => keys.push(PositionKey::Comment),
            NodeKind::ProcessingInstruction => {
                keys.push(PositionKey::AnyProcessingInstruction);
                if let Some(target) = event.name() {
                    keys.push(PositionKey::ProcessingInstruction(target.local.clone()));
                }
            }
        }
        keys.push(PositionKey::AnyNode);
        keys
    }
}

#[derive(Debug)]
struct Entry {
    event: Arc<Event>,
    counters: HashMap<PositionKey, usize>,
}

#[derive(Debug, Default)]
pub struct AncestorStack {
    entries: Vec<Entry>,
}

impl AncestorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a node. Returns the new height.
    pub fn push(&mut self, event: Event) -> usize {
        self.push_shared(Arc::new(event))
    }

    pub fn push_shared(&mut self, event: Arc<Event>) -> usize {
        if let Some(parent) = self.entries.last_mut() {
            for key in PositionKey::keys_for(&event) {
                *parent.counters.entry(key).or_insert(0) += 1;
            }
        }
        tracing::trace!(kind = %event.kind(), depth = self.entries.len(), "push");
        self.entries.push(Entry { event, counters: HashMap::new() });
        self.entries.len()
    }

    /// Close the innermost node.
    pub fn pop(&mut self) -> Option<Arc<Event>> {
        let entry = self.entries.pop()?;
        tracing::trace!(kind = %entry.event.kind(), depth = self.entries.len(), "pop");
        Some(entry.event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Event>> {
        self.entries.get(index).map(|e| &e.event)
    }

    pub fn top(&self) -> Option<&Arc<Event>> {
        self.entries.last().map(|e| &e.event)
    }

    /// A node value for the entry at `index`.
    pub fn node_ref(&self, index: usize) -> Option<NodeRef> {
        self.get(index).map(|event| NodeRef::Entry { depth: index, event: Arc::clone(event) })
    }

    /// 1-based position of the entry at `index` among its parent's children of class `key`
    /// seen so far (the entry itself included). The root is at position 1.
    pub fn position_of(&self, index: usize, key: &PositionKey) -> usize {
        if index == 0 {
            return 1;
        }
        self.entries.get(index - 1).and_then(|parent| parent.counters.get(key).copied()).unwrap_or(0)
    }

    /// Attribute list of the element at `index`; empty for other entries.
    pub fn attributes(&self, index: usize) -> &[Attribute] {
        self.get(index).map_or(&[], |e| e.attributes())
    }

    /// Index of the entry holding `event`, if it is still open.
    pub fn depth_of(&self, event: &Arc<Event>) -> Option<usize> {
        self.entries.iter().rposition(|e| Arc::ptr_eq(&e.event, event))
    }

    /// Whether the entry a node value was taken from is still on the stack.
    pub fn is_live(&self, node: &NodeRef) -> bool {
        match node {
            NodeRef::Entry { depth, event } => self.get(*depth).is_some_and(|e| Arc::ptr_eq(e, event)),
            NodeRef::Attribute { owner, .. } => self.depth_of(owner).is_some(),
        }
    }
}
