//! Static group structure.
//!
//! Groups nest lexically; each group knows its static parent. The table is built once per
//! compiled transformation and shared read-only between runs. Run-time binding frames live
//! in [`crate::context::Context`].
use core::fmt;

use crate::ast::CopyMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

impl GroupId {
    /// The outermost group every table starts with.
    pub const ROOT: GroupId = GroupId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDef {
    pub name: Option<String>,
    pub parent: Option<GroupId>,
}

#[derive(Debug, Clone)]
pub struct GroupTable {
    groups: Vec<GroupDef>,
}

impl Default for GroupTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupTable {
    pub fn new() -> Self {
        Self { groups: vec![GroupDef { name: None, parent: None }] }
    }

    /// Declare a group nested in `parent`.
    pub fn add(&mut self, parent: GroupId, name: Option<&str>) -> GroupId {
        self.push(GroupDef { name: name.map(str::to_string), parent: Some(parent) })
    }

    fn push(&mut self, def: GroupDef) -> GroupId {
        let id = GroupId(u32::try_from(self.groups.len()).unwrap_or(u32::MAX));
        self.groups.push(def);
        id
    }

    pub fn get(&self, id: GroupId) -> Option<&GroupDef> {
        self.groups.get(id.index())
    }

    pub fn parent(&self, id: GroupId) -> Option<GroupId> {
        self.get(id).and_then(|g| g.parent)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// `id` followed by its static ancestors, innermost first.
    pub fn lineage(&self, id: GroupId) -> impl Iterator<Item = GroupId> + '_ {
        core::iter::successors(Some(id), move |g| self.parent(*g))
    }

    /// Whether `inner` is `outer` or statically nested inside it.
    pub fn is_within(&self, inner: GroupId, outer: GroupId) -> bool {
        self.lineage(inner).any(|g| g == outer)
    }

    /// Copy a group for a specialization. Repeated requests for the same group within one
    /// copy operation return the same clone.
    pub fn copy_group(&mut self, id: GroupId, map: &mut CopyMap) -> GroupId {
        if let Some(copy) = map.group(id) {
            return copy;
        }
        let def = self.get(id).cloned().unwrap_or(GroupDef { name: None, parent: None });
        let copy = self.push(def);
        map.record_group(id, copy);
        copy
    }

    /// Re-point parent links of copied groups whose parents were copied by the same operation.
    pub fn relink_copies(&mut self, map: &CopyMap) {
        for (_, copy) in map.groups() {
            if let Some(parent) = self.parent(copy)
                && let Some(new_parent) = map.group(parent)
            {
                self.groups[copy.index()].parent = Some(new_parent);
            }
        }
    }
}
