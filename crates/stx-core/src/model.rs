use core::fmt;
use std::sync::Arc;

use compact_str::CompactString;

use crate::xdm::ExpandedName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Text => "text",
            NodeKind::CData => "cdata",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: ExpandedName,
    pub value: CompactString,
}

/// One node event as delivered by the streaming driver.
///
/// Elements carry their attribute list; text, comment, processing-instruction and attribute
/// events carry their textual content. The string value of an element or the document is
/// empty: its content has not been seen yet when it is on the ancestor stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: NodeKind,
    name: Option<ExpandedName>,
    value: CompactString,
    attributes: Vec<Attribute>,
}

impl Event {
    fn new(kind: NodeKind, name: Option<ExpandedName>, value: &str) -> Self {
        Self { kind, name, value: CompactString::from(value), attributes: Vec::new() }
    }

    pub fn document() -> Self {
        Self::new(NodeKind::Document, None, "")
    }

    pub fn element(name: ExpandedName) -> Self {
        Self::new(NodeKind::Element, Some(name), "")
    }

    /// Builder-style attribute registration for element events.
    pub fn with_attribute(mut self, name: ExpandedName, value: &str) -> Self {
        self.attributes.push(Attribute { name, value: CompactString::from(value) });
        self
    }

    /// Synthetic attribute entry, pushed by the driver while visiting an element's attributes.
    pub fn attribute(name: ExpandedName, value: &str) -> Self {
        Self::new(NodeKind::Attribute, Some(name), value)
    }

    pub fn text(value: &str) -> Self {
        Self::new(NodeKind::Text, None, value)
    }

    pub fn cdata(value: &str) -> Self {
        Self::new(NodeKind::CData, None, value)
    }

    pub fn comment(value: &str) -> Self {
        Self::new(NodeKind::Comment, None, value)
    }

    pub fn processing_instruction(target: &str, data: &str) -> Self {
        Self::new(NodeKind::ProcessingInstruction, Some(ExpandedName::local(target)), data)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> Option<&ExpandedName> {
        self.name.as_ref()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn is_element_named(&self, name: &ExpandedName) -> bool {
        self.kind == NodeKind::Element && self.name.as_ref() == Some(name)
    }
}

/// A node value.
///
/// `Entry` points into the ancestor stack and is only meaningful while the entry at `depth`
/// is still the same event; [`crate::stack::AncestorStack::is_live`] detects stale
/// references. `Attribute` addresses one attribute of an element event.
#[derive(Debug, Clone)]
pub enum NodeRef {
    Entry { depth: usize, event: Arc<Event> },
    Attribute { owner: Arc<Event>, index: usize },
}

impl NodeRef {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Entry { event, .. } => event.kind(),
            NodeRef::Attribute { .. } => NodeKind::Attribute,
        }
    }

    pub fn name(&self) -> Option<&ExpandedName> {
        match self {
            NodeRef::Entry { event, .. } => event.name(),
            NodeRef::Attribute { owner, index } => owner.attributes.get(*index).map(|a| &a.name),
        }
    }

    pub fn string_value(&self) -> String {
        match self {
            NodeRef::Entry { event, .. } => event.value().to_string(),
            NodeRef::Attribute { owner, index } => {
                owner.attributes.get(*index).map(|a| a.value.to_string()).unwrap_or_default()
            }
        }
    }

    /// Stack depth of the referenced entry; attributes of an element are not on the stack.
    pub fn depth(&self) -> Option<usize> {
        match self {
            NodeRef::Entry { depth, .. } => Some(*depth),
            NodeRef::Attribute { .. } => None,
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeRef::Entry { depth: da, event: ea }, NodeRef::Entry { depth: db, event: eb }) => {
                da == db && Arc::ptr_eq(ea, eb)
            }
            (NodeRef::Attribute { owner: oa, index: ia }, NodeRef::Attribute { owner: ob, index: ib }) => {
                ia == ib && Arc::ptr_eq(oa, ob)
            }
            _ => false,
        }
    }
}
