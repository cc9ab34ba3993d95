//! Pattern matching against the ancestor stack.
//!
//! `matches(id, ctx, top, set_position)` asks whether the stack prefix of height `top` (its
//! innermost entry at index `top - 1`) satisfies the pattern rooted at `id`. Too little
//! height is an ordinary `false`: a streaming engine only ever holds ancestors. `Err` is
//! returned only when the run must abort.
use super::{Ast, NodeId, TreeKind};
use crate::context::Context;
use crate::model::{Event, NodeKind};
use crate::runtime::Error;
use crate::stack::PositionKey;
use crate::xdm::ExpandedName;

impl Ast {
    pub fn matches(&self, id: NodeId, ctx: &mut Context, top: usize, set_position: bool) -> Result<bool, Error> {
        let node = self.node(id);
        match &node.kind {
            TreeKind::Root => {
                let matched = top == 1 && ctx.stack().get(0).is_some_and(|e| e.kind() == NodeKind::Document);
                if matched && set_position {
                    ctx.set_position(1);
                }
                Ok(matched)
            }
            TreeKind::Child => {
                let (left, right) = self.operands(id, ctx, "matched")?;
                if top == 0 || !self.matches(right, ctx, top, set_position)? {
                    return Ok(false);
                }
                self.matches(left, ctx, top - 1, false)
            }
            TreeKind::Descendant => {
                let (left, right) = self.operands(id, ctx, "matched")?;
                if !self.matches(right, ctx, top, set_position)? {
                    return Ok(false);
                }
                for height in (0..top).rev() {
                    if self.matches(left, ctx, height, false)? {
                        tracing::trace!(node = %id, top, height, "descendant step anchored");
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            TreeKind::Union => {
                let (left, right) = self.operands(id, ctx, "matched")?;
                Ok(self.matches(left, ctx, top, set_position)? || self.matches(right, ctx, top, set_position)?)
            }
            TreeKind::Predicate => {
                let (base, predicate) = self.operands(id, ctx, "matched")?;
                let saved = ctx.position();
                let matched = self.matches(base, ctx, top, true)?
                    && predicate_holds(&self.evaluate(predicate, ctx, top)?, ctx.position());
                if !set_position {
                    ctx.set_position(saved);
                }
                Ok(matched)
            }
            kind @ (TreeKind::Name(_)
            | TreeKind::Wildcard
            | TreeKind::NsWildcard(_)
            | TreeKind::LocalWildcard(_)
            | TreeKind::AnyNode
            | TreeKind::Text
            | TreeKind::CData
            | TreeKind::Comment
            | TreeKind::ProcessingInstruction(_)) => {
                if top < 2 {
                    return Ok(false);
                }
                let Some(event) = ctx.stack().get(top - 1) else {
                    return Ok(false);
                };
                if !node_test_matches(kind, event) {
                    return Ok(false);
                }
                if set_position && let Some(key) = position_key(kind) {
                    let position = ctx.stack().position_of(top - 1, &key);
                    ctx.set_position(position);
                }
                Ok(true)
            }
            kind @ (TreeKind::AttrName(_)
            | TreeKind::AttrWildcard
            | TreeKind::AttrNsWildcard(_)
            | TreeKind::AttrLocalWildcard(_)) => {
                if top < 3 {
                    return Ok(false);
                }
                Ok(ctx.stack().get(top - 1).is_some_and(|event| {
                    event.kind() == NodeKind::Attribute && event.name().is_some_and(|n| attribute_test_matches(kind, n))
                }))
            }
            TreeKind::FunctionCall(_)
            | TreeKind::Number(_)
            | TreeKind::String(_)
            | TreeKind::Arith(_)
            | TreeKind::Negate
            | TreeKind::Logic(_)
            | TreeKind::Compare(_)
            | TreeKind::Sequence
            | TreeKind::List
            | TreeKind::Avt
            | TreeKind::VarRef(_)
            | TreeKind::ContextItem
            | TreeKind::Parent
            | TreeKind::Value(_) => Err(self.role_error(id, ctx, "used as a pattern")),
        }
    }

    /// Both children of a binary node. A missing child is a compiler defect.
    pub(crate) fn operands(&self, id: NodeId, ctx: &Context, role: &str) -> Result<(NodeId, NodeId), Error> {
        let node = self.node(id);
        match (node.left, node.right) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(self.role_error(id, ctx, &format!("{role} without both operands"))),
        }
    }

    /// Fatal error naming the node that cannot act in the requested role.
    pub(crate) fn role_error(&self, id: NodeId, ctx: &Context, role: &str) -> Error {
        let error = Error::fatal(format!("{} {id} cannot be {role}", self.describe(id))).at(ctx.location());
        tracing::error!(code = %error.code, location = %error.location, "{}", error.message);
        error
    }
}

/// A predicate result selects the item if it is the single number equal to the position,
/// or otherwise if its boolean value is true.
pub(crate) fn predicate_holds(result: &crate::xdm::Sequence, position: usize) -> bool {
    #[allow(clippy::cast_precision_loss)]
    result.as_single_number().map_or_else(|| result.to_boolean(), |n| n == position as f64)
}

pub(crate) fn node_test_matches(kind: &TreeKind, event: &Event) -> bool {
    let is_element = event.kind() == NodeKind::Element;
    match kind {
        TreeKind::Name(name) => event.is_element_named(name),
        TreeKind::Wildcard => is_element,
        TreeKind::NsWildcard(ns) => is_element && event.name().is_some_and(|n| n.ns_uri() == ns),
        TreeKind::LocalWildcard(local) => is_element && event.name().is_some_and(|n| &n.local == local),
        TreeKind::AnyNode => !matches!(event.kind(), NodeKind::Document | NodeKind::Attribute),
        TreeKind::Text => matches!(event.kind(), NodeKind::Text | NodeKind::CData),
        TreeKind::CData => event.kind() == NodeKind::CData,
        TreeKind::Comment => event.kind() == NodeKind::Comment,
        TreeKind::ProcessingInstruction(target) => {
            event.kind() == NodeKind::ProcessingInstruction
                && target.as_ref().is_none_or(|t| event.name().is_some_and(|n| &n.local == t))
        }
        _ => false,
    }
}

pub(crate) fn attribute_test_matches(kind: &TreeKind, name: &ExpandedName) -> bool {
    match kind {
        TreeKind::AttrName(expected) => expected == name,
        TreeKind::AttrWildcard => true,
        TreeKind::AttrNsWildcard(ns) => name.ns_uri() == ns,
        TreeKind::AttrLocalWildcard(local) => &name.local == local,
        _ => false,
    }
}

/// Sibling class a node test counts positions in.
fn position_key(kind: &TreeKind) -> Option<PositionKey> {
    Some(match kind {
        TreeKind::Name(name) => PositionKey::Element(name.clone()),
        TreeKind::Wildcard => PositionKey::AnyElement,
        TreeKind::NsWildcard(ns) => PositionKey::ElementNs(ns.clone()),
        TreeKind::LocalWildcard(local) => PositionKey::ElementLocal(local.clone()),
        TreeKind::AnyNode => PositionKey::AnyNode,
        TreeKind::Text => PositionKey::Text,
        TreeKind::CData => PositionKey::CData,
        TreeKind::Comment => PositionKey::Comment,
        TreeKind::ProcessingInstruction(None) => PositionKey::AnyProcessingInstruction,
        TreeKind::ProcessingInstruction(Some(target)) => PositionKey::ProcessingInstruction(target.clone()),
        _ => return None,
    })
}
