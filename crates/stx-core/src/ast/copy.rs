//! Deep copies of subtrees for group specializations.
//!
//! One [`CopyMap`] spans a whole copy operation: nodes and groups reached more than once map
//! to the same clone. The map is then used to carry per-run state keyed by node or group
//! (see [`crate::context::Context::remap_scope_cache`]).
use std::collections::HashMap;

use super::{Ast, NodeId, TreeNode};
use crate::group::GroupId;

#[derive(Debug, Clone, Default)]
pub struct CopyMap {
    nodes: HashMap<NodeId, NodeId>,
    groups: HashMap<GroupId, GroupId>,
}

impl CopyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, original: NodeId) -> Option<NodeId> {
        self.nodes.get(&original).copied()
    }

    pub fn group(&self, original: GroupId) -> Option<GroupId> {
        self.groups.get(&original).copied()
    }

    /// Map a group through this copy; groups that were not copied map to themselves.
    pub fn map_group(&self, original: GroupId) -> GroupId {
        self.group(original).unwrap_or(original)
    }

    pub fn record_group(&mut self, original: GroupId, copy: GroupId) {
        self.groups.insert(original, copy);
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes.iter().map(|(k, v)| (*k, *v))
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, GroupId)> + '_ {
        self.groups.iter().map(|(k, v)| (*k, *v))
    }
}

impl Ast {
    /// Duplicate the structure below `id`. Literal payloads (strings, precomputed values)
    /// are shared with the original.
    pub fn deep_copy(&mut self, id: NodeId, map: &mut CopyMap) -> NodeId {
        if let Some(copy) = map.node(id) {
            return copy;
        }
        let original = self.node(id).clone();
        let left = original.left.map(|l| self.deep_copy(l, map));
        let right = original.right.map(|r| self.deep_copy(r, map));
        let copy = self.push(TreeNode { left, right, ..original });
        map.nodes.insert(id, copy);
        copy
    }
}
