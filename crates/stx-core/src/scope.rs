//! Lexical variable resolution.
//!
//! Rule-local bindings shadow everything. Otherwise the current group and its *static*
//! ancestors are searched, innermost first, each through its innermost active frame. A group
//! that is active recursively is therefore seen only through its latest activation, and a
//! group that is active but not a static ancestor of the current group is never consulted.
use crate::ast::NodeId;
use crate::context::Context;
use crate::group::GroupId;
use crate::runtime::Error;
use crate::xdm::{ExpandedName, Sequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Group(GroupId),
}

impl Context {
    /// Where `name` is bound, as seen from the current group.
    pub fn find_variable_scope(&self, name: &ExpandedName) -> Option<Scope> {
        if self.locals.contains_key(name) {
            return Some(Scope::Local);
        }
        let start = self.current_group()?;
        self.groups
            .lineage(start)
            .find(|g| self.innermost_frame(*g).is_some_and(|frame| frame.contains_key(name)))
            .map(Scope::Group)
    }

    /// Value of the variable referenced by `node`. The group found on first use is cached
    /// per node; later reads go straight to that group's innermost frame.
    pub(crate) fn read_variable(&mut self, node: NodeId, name: &ExpandedName) -> Option<Sequence> {
        if let Some(v) = self.locals.get(name) {
            return Some(v.clone());
        }
        let group = match self.cached_scope(node) {
            Some(group) => {
                tracing::debug!(variable = %name, %group, %node, "variable scope cache hit");
                group
            }
            None => match self.find_variable_scope(name)? {
                Scope::Local => return self.locals.get(name).cloned(),
                Scope::Group(group) => {
                    tracing::debug!(variable = %name, %group, %node, "variable scope resolved");
                    self.scope_cache.insert(node, group);
                    group
                }
            },
        };
        self.innermost_frame(group).and_then(|frame| frame.get(name)).cloned()
    }

    /// Rebind an existing variable where it was found. An unknown name is reported through
    /// the sink and otherwise ignored.
    pub fn assign(&mut self, name: &ExpandedName, value: Sequence) -> Result<(), Error> {
        match self.find_variable_scope(name) {
            Some(Scope::Local) => {
                self.locals.insert(name.clone(), value);
                Ok(())
            }
            Some(Scope::Group(group)) => {
                if let Some(frame) = self.innermost_frame_mut(group) {
                    frame.insert(name.clone(), value);
                }
                Ok(())
            }
            None => self.report(Error::undeclared_variable(name)),
        }
    }
}
