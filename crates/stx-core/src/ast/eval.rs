//! Expression evaluation.
//!
//! `evaluate(id, ctx, top)` computes the value of the expression rooted at `id` with the
//! context node at stack index `top - 1`. Path expressions only reach nodes that are on the
//! stack (ancestors and the node being processed) and the attributes of open elements.
//! Recoverable conditions go through the context's error sink and fall back to the empty
//! sequence when the sink lets the run continue.
use super::matching::{attribute_test_matches, predicate_holds};
use super::{ArithOp, Ast, LogicOp, NodeId, TreeKind};
use crate::compare::general_compare;
use crate::context::Context;
use crate::functions::CallCtx;
use crate::model::{NodeKind, NodeRef};
use crate::runtime::{Error, ErrorCode};
use crate::xdm::{Sequence, Value};

fn type_error(msg: impl Into<String>) -> Error {
    Error::from_code(ErrorCode::XPTY0004, msg)
}

/// Report the first node of `value` whose stack entry is gone. `Ok(false)` means the value
/// must not be used.
fn check_live(ctx: &Context, value: &Sequence, role: &str) -> Result<bool, Error> {
    match value.iter().filter_map(Value::as_node).find(|n| !ctx.stack().is_live(n)) {
        Some(stale) => {
            ctx.report(type_error(format!("{role} is a closed {} node", stale.kind())))?;
            Ok(false)
        }
        None => Ok(true),
    }
}

impl Ast {
    pub fn evaluate(&self, id: NodeId, ctx: &mut Context, top: usize) -> Result<Sequence, Error> {
        let node = self.node(id);
        match &node.kind {
            TreeKind::Root => Ok(stack_node(ctx, top.min(1), 0)),
            TreeKind::ContextItem => Ok(top.checked_sub(1).map_or_else(Sequence::empty, |i| stack_node(ctx, top, i))),
            TreeKind::Parent => Ok(top.checked_sub(2).map_or_else(Sequence::empty, |i| stack_node(ctx, top, i))),
            TreeKind::Name(_)
            | TreeKind::Wildcard
            | TreeKind::NsWildcard(_)
            | TreeKind::LocalWildcard(_)
            | TreeKind::AnyNode
            | TreeKind::Text
            | TreeKind::CData
            | TreeKind::Comment
            | TreeKind::ProcessingInstruction(_) => {
                // the only child of the context node that is visible is the next stack entry
                if top >= 1 && top < ctx.height() && self.matches(id, ctx, top + 1, false)? {
                    Ok(stack_node(ctx, top + 1, top))
                } else {
                    Ok(Sequence::empty())
                }
            }
            kind @ (TreeKind::AttrName(_)
            | TreeKind::AttrWildcard
            | TreeKind::AttrNsWildcard(_)
            | TreeKind::AttrLocalWildcard(_)) => {
                let Some(owner) = top.checked_sub(1).and_then(|i| ctx.stack().get(i)) else {
                    return Ok(Sequence::empty());
                };
                if owner.kind() != NodeKind::Element {
                    return Ok(Sequence::empty());
                }
                Ok(owner
                    .attributes()
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| attribute_test_matches(kind, &a.name))
                    .map(|(index, _)| Value::Node(NodeRef::Attribute { owner: owner.clone(), index }))
                    .collect())
            }
            TreeKind::Child => self.evaluate_step(id, ctx, top, false),
            TreeKind::Descendant => self.evaluate_step(id, ctx, top, true),
            TreeKind::Union => {
                let (left, right) = self.operands(id, ctx, "evaluated")?;
                let mut items = self.evaluate(left, ctx, top)?;
                items.append(self.evaluate(right, ctx, top)?);
                if !check_live(ctx, &items, "union operand")? {
                    return Ok(Sequence::empty());
                }
                union_in_document_order(items, ctx)
            }
            TreeKind::Predicate => self.evaluate_filter(id, ctx, top),
            TreeKind::FunctionCall(name) => {
                let mut args = Vec::new();
                for arg in self.arguments(node.left) {
                    args.push(self.evaluate(arg, ctx, top)?);
                }
                for arg in &args {
                    if !check_live(ctx, arg, &format!("argument of {name}()"))? {
                        return Ok(Sequence::empty());
                    }
                }
                let result = match self.functions.resolve(name, args.len()) {
                    Ok(f) => (**f)(&CallCtx { context: &*ctx, top }, &args),
                    Err(e) => Err(e.into()),
                };
                match result {
                    Ok(value) => Ok(value),
                    Err(e) => {
                        ctx.report(e)?;
                        Ok(Sequence::empty())
                    }
                }
            }
            TreeKind::Number(n) => Ok(Sequence::one(*n)),
            TreeKind::String(s) => Ok(Sequence::one(Value::String(s.clone()))),
            TreeKind::Value(v) => Ok(Sequence::clone(v)),
            TreeKind::Arith(op) => {
                let (left, right) = self.operands(id, ctx, "evaluated")?;
                let a = self.evaluate(left, ctx, top)?;
                let b = self.evaluate(right, ctx, top)?;
                if a.is_empty() || b.is_empty() {
                    return Ok(Sequence::empty());
                }
                if a.len() > 1 || b.len() > 1 {
                    ctx.report(type_error("arithmetic operand is a sequence of more than one item"))?;
                    return Ok(Sequence::empty());
                }
                if !check_live(ctx, &a, "arithmetic operand")? || !check_live(ctx, &b, "arithmetic operand")? {
                    return Ok(Sequence::empty());
                }
                let (x, y) = (a.to_number(), b.to_number());
                Ok(Sequence::one(match op {
                    ArithOp::Add => x + y,
                    ArithOp::Sub => x - y,
                    ArithOp::Mul => x * y,
                    ArithOp::Div => x / y,
                    ArithOp::Mod => x % y,
                }))
            }
            TreeKind::Negate => {
                let Some(operand) = node.left else {
                    return Err(self.role_error(id, ctx, "evaluated without an operand"));
                };
                let value = self.evaluate(operand, ctx, top)?;
                if value.is_empty() {
                    return Ok(Sequence::empty());
                }
                if value.len() > 1 {
                    ctx.report(type_error("operand of unary minus is a sequence of more than one item"))?;
                    return Ok(Sequence::empty());
                }
                if !check_live(ctx, &value, "operand of unary minus")? {
                    return Ok(Sequence::empty());
                }
                Ok(Sequence::one(-value.to_number()))
            }
            TreeKind::Logic(op) => {
                let (left, right) = self.operands(id, ctx, "evaluated")?;
                let first = self.evaluate(left, ctx, top)?.to_boolean();
                let result = match (op, first) {
                    (LogicOp::And, false) => false,
                    (LogicOp::Or, true) => true,
                    _ => self.evaluate(right, ctx, top)?.to_boolean(),
                };
                Ok(Sequence::one(result))
            }
            TreeKind::Compare(op) => {
                let (left, right) = self.operands(id, ctx, "evaluated")?;
                let a = self.evaluate(left, ctx, top)?;
                let b = self.evaluate(right, ctx, top)?;
                if !check_live(ctx, &a, "comparison operand")? || !check_live(ctx, &b, "comparison operand")? {
                    return Ok(Sequence::empty());
                }
                Ok(Sequence::one(general_compare(&a, *op, &b)))
            }
            TreeKind::Sequence => {
                let (left, right) = self.operands(id, ctx, "evaluated")?;
                let mut items = self.evaluate(left, ctx, top)?;
                items.append(self.evaluate(right, ctx, top)?);
                Ok(items)
            }
            TreeKind::List => Err(self.role_error(id, ctx, "evaluated outside a function call")),
            TreeKind::Avt => {
                let prefix = match node.left {
                    Some(prefix) => self.evaluate(prefix, ctx, top)?,
                    None => Sequence::empty(),
                };
                let part = match node.right {
                    Some(part) => self.evaluate(part, ctx, top)?,
                    None => Sequence::empty(),
                };
                if !check_live(ctx, &prefix, "template text")? || !check_live(ctx, &part, "template part")? {
                    return Ok(Sequence::empty());
                }
                let mut text = prefix.string_value();
                text.push_str(&part.join(" "));
                Ok(Sequence::one(Value::string(text)))
            }
            TreeKind::VarRef(name) => match ctx.read_variable(id, name) {
                Some(value) => Ok(value),
                None => {
                    ctx.report(Error::undeclared_variable(name))?;
                    Ok(Sequence::empty())
                }
            },
        }
    }

    /// `left/right` and `left//right`: evaluate `right` below every node `left` yields.
    fn evaluate_step(&self, id: NodeId, ctx: &mut Context, top: usize, descendant: bool) -> Result<Sequence, Error> {
        let (left, right) = self.operands(id, ctx, "evaluated")?;
        let base = self.evaluate(left, ctx, top)?;
        let mut out = Sequence::empty();
        for item in base {
            let Value::Node(node) = item else {
                ctx.report(type_error(format!("path step applied to a {}", item.type_name())))?;
                return Ok(Sequence::empty());
            };
            if !ctx.stack().is_live(&node) {
                ctx.report(type_error(format!("path step applied to a closed {} node", node.kind())))?;
                return Ok(Sequence::empty());
            }
            // attributes have no children
            let Some(depth) = node.depth() else { continue };
            if descendant {
                for height in depth + 1..=ctx.height() {
                    out.append(self.evaluate(right, ctx, height)?);
                }
            } else {
                out.append(self.evaluate(right, ctx, depth + 1)?);
            }
        }
        Ok(out)
    }

    /// `base[predicate]` as an expression: keep the items of `base` the predicate selects,
    /// each item evaluated as context node with its 1-based index as position.
    fn evaluate_filter(&self, id: NodeId, ctx: &mut Context, top: usize) -> Result<Sequence, Error> {
        let (base, predicate) = self.operands(id, ctx, "evaluated")?;
        let items = self.evaluate(base, ctx, top)?;
        let fixed = if self.is_constant(predicate) { Some(self.evaluate(predicate, ctx, top)?) } else { None };
        let saved = ctx.position();
        let mut out = Sequence::empty();
        for (i, item) in items.into_iter().enumerate() {
            let position = i + 1;
            let verdict = match &fixed {
                Some(value) => value.clone(),
                None => {
                    let depth = item.as_node().filter(|n| ctx.stack().is_live(n)).and_then(NodeRef::depth);
                    let Some(depth) = depth else {
                        ctx.set_position(saved);
                        ctx.report(type_error(format!("predicate applied to a {} outside the stack", item.type_name())))?;
                        return Ok(Sequence::empty());
                    };
                    ctx.set_position(position);
                    self.evaluate(predicate, ctx, depth + 1)?
                }
            };
            if predicate_holds(&verdict, position) {
                out.push(item);
            }
        }
        ctx.set_position(saved);
        Ok(out)
    }
}

/// Deduplicate union operands and put them in document order. Stack entries are ordered by
/// depth, attributes come right after their element.
fn union_in_document_order(items: Sequence, ctx: &Context) -> Result<Sequence, Error> {
    let mut keyed: Vec<((usize, usize), NodeRef)> = Vec::with_capacity(items.len());
    for item in items {
        let Value::Node(node) = item else {
            ctx.report(type_error(format!("union operand is a {}", item.type_name())))?;
            return Ok(Sequence::empty());
        };
        let key = match &node {
            NodeRef::Entry { depth, .. } => (*depth, 0),
            NodeRef::Attribute { owner, index } => match ctx.stack().depth_of(owner) {
                Some(depth) => (depth, index + 1),
                None => {
                    ctx.report(type_error("union operand is a closed attribute node"))?;
                    return Ok(Sequence::empty());
                }
            },
        };
        if !keyed.iter().any(|(_, seen)| *seen == node) {
            keyed.push((key, node));
        }
    }
    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, node)| Value::Node(node)).collect())
}

/// The stack entry at `index` as a node value, if it is within the visible prefix `top`.
fn stack_node(ctx: &Context, top: usize, index: usize) -> Sequence {
    if index >= top {
        return Sequence::empty();
    }
    ctx.stack().node_ref(index).map_or_else(Sequence::empty, |n| Sequence::one(n))
}
