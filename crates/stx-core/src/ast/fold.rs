use std::sync::Arc;

use super::{Ast, NodeId, TreeKind, TreeNode};
use crate::context::ContextBuilder;
use crate::group::GroupTable;
use crate::runtime::CollectingSink;

impl Ast {
    /// Replace every maximal constant subtree below `id` (inclusive) by a precomputed value.
    /// Literals are left alone. A subtree whose evaluation raises a diagnostic is kept, since
    /// that diagnostic belongs to the run, but its own children are still folded. Returns the
    /// number of subtrees folded.
    pub fn fold_constants(&mut self, id: NodeId) -> usize {
        let node = self.node(id);
        if matches!(node.kind, TreeKind::Number(_) | TreeKind::String(_) | TreeKind::Value(_)) {
            return 0;
        }
        if !node.constant || matches!(node.kind, TreeKind::List) {
            return self.fold_children(id);
        }

        let diagnostics = CollectingSink::new();
        let mut ctx = ContextBuilder::new(Arc::new(GroupTable::new())).with_sink(Arc::new(diagnostics.clone())).build();
        let value = match self.evaluate(id, &mut ctx, 0) {
            Ok(value) if diagnostics.errors().is_empty() => value,
            _ => {
                tracing::trace!(node = %id, "constant subtree left unfolded");
                return self.fold_children(id);
            }
        };
        let priority = node.priority;
        tracing::trace!(node = %id, kind = %node.kind.describe(), "constant subtree folded");
        self.nodes[id.index()] =
            TreeNode { kind: TreeKind::Value(Arc::new(value)), left: None, right: None, priority, constant: true };
        1
    }

    fn fold_children(&mut self, id: NodeId) -> usize {
        let node = self.node(id);
        let children = [node.left, node.right];
        children.into_iter().flatten().map(|child| self.fold_constants(child)).sum()
    }
}
