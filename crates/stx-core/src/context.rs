//! Per-run execution context.
//!
//! A [`Context`] is created for one transformation run and mutated with every event: the
//! driver pushes and pops the [`AncestorStack`], enters and leaves groups, and binds
//! variables; matching and evaluation read it and update the current position.
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::ast::{CopyMap, NodeId};
use crate::group::{GroupId, GroupTable};
use crate::model::{Event, NodeKind};
use crate::runtime::{Error, ErrorSink, FatalSink, Location};
use crate::stack::AncestorStack;
use crate::xdm::{ExpandedName, Sequence};

/// One activation of a group: its variable bindings.
pub(crate) type Frame = HashMap<ExpandedName, Sequence>;

/// Driver state as seen from the top of the ancestor stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    InDocument,
    InElement,
    InAttribute,
    InText,
    InCData,
    InComment,
    InProcessingInstruction,
}

pub struct Context {
    stack: AncestorStack,
    position: usize,
    current_group: Option<GroupId>,
    /// Groups entered and not yet left, with the group that was current before each entry.
    group_trail: Vec<(GroupId, Option<GroupId>)>,
    pub(crate) locals: HashMap<ExpandedName, Sequence>,
    /// Binding frames per group, indexed by group id; innermost activation last.
    pub(crate) frames: Vec<SmallVec<[Frame; 2]>>,
    pub(crate) groups: Arc<GroupTable>,
    /// Group a variable reference node resolved to, filled on first use.
    pub(crate) scope_cache: HashMap<NodeId, GroupId>,
    sink: Arc<dyn ErrorSink>,
    location: Location,
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("stack", &self.stack)
            .field("position", &self.position)
            .field("current_group", &self.current_group)
            .field("locals", &self.locals)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(groups: Arc<GroupTable>) -> Self {
        ContextBuilder::new(groups).build()
    }

    // ===== ancestor stack =====

    pub fn stack(&self) -> &AncestorStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut AncestorStack {
        &mut self.stack
    }

    /// Open a node; returns the new stack height.
    pub fn push(&mut self, event: Event) -> usize {
        self.stack.push(event)
    }

    pub fn pop(&mut self) -> Option<Arc<Event>> {
        self.stack.pop()
    }

    pub fn height(&self) -> usize {
        self.stack.len()
    }

    /// Run `f` with `event` pushed. Afterwards the stack is back at the height it had before,
    /// whatever `f` returns or leaves open.
    pub fn with_entry<R, E>(&mut self, event: Event, f: impl FnOnce(&mut Self) -> Result<R, E>) -> Result<R, E> {
        let height = self.stack.push(event);
        let result = f(self);
        if self.stack.len() != height {
            tracing::warn!(expected = height, actual = self.stack.len(), "unbalanced push/pop inside with_entry");
        }
        while self.stack.len() >= height {
            self.stack.pop();
        }
        result
    }

    pub fn state(&self) -> DriverState {
        match self.stack.top().map(|e| e.kind()) {
            None => DriverState::Idle,
            Some(NodeKind::Document) => DriverState::InDocument,
            Some(NodeKind::Element) => DriverState::InElement,
            Some(NodeKind::Attribute) => DriverState::InAttribute,
            Some(NodeKind::Text) => DriverState::InText,
            Some(NodeKind::CData) => DriverState::InCData,
            Some(NodeKind::Comment) => DriverState::InComment,
            Some(NodeKind::ProcessingInstruction) => DriverState::InProcessingInstruction,
        }
    }

    // ===== position / location =====

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Location of the instruction being executed; attached to every diagnostic.
    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    // ===== groups =====

    pub fn groups(&self) -> &Arc<GroupTable> {
        &self.groups
    }

    pub fn current_group(&self) -> Option<GroupId> {
        self.current_group
    }

    pub fn set_current_group(&mut self, group: Option<GroupId>) {
        self.current_group = group;
    }

    /// Activate `group`: push a fresh binding frame and make it the current group.
    pub fn enter_group(&mut self, group: GroupId) {
        let idx = group.index();
        if self.frames.len() <= idx {
            self.frames.resize_with(idx + 1, SmallVec::new);
        }
        self.frames[idx].push(Frame::new());
        self.group_trail.push((group, self.current_group));
        self.current_group = Some(group);
        tracing::debug!(%group, depth = self.frames[idx].len(), "enter group");
    }

    /// Leave the innermost activation, which must be of `group`.
    pub fn exit_group(&mut self, group: GroupId) -> Result<(), Error> {
        match self.group_trail.last() {
            Some((innermost, _)) if *innermost == group => {}
            Some((innermost, _)) => {
                let err = Error::fatal(format!("exit of {group} while {innermost} is the innermost active group"));
                return Err(err.at(&self.location));
            }
            None => {
                return Err(Error::fatal(format!("exit of {group} without an active group")).at(&self.location));
            }
        }
        if let Some((_, previous)) = self.group_trail.pop() {
            self.current_group = previous;
        }
        if let Some(frames) = self.frames.get_mut(group.index()) {
            frames.pop();
        }
        tracing::debug!(%group, "exit group");
        Ok(())
    }

    /// Run `f` inside an activation of `group`; the activation ends whatever `f` returns.
    /// Activations the body left open are closed too; that is an error unless the body
    /// already failed.
    pub fn with_group<R>(&mut self, group: GroupId, f: impl FnOnce(&mut Self) -> Result<R, Error>) -> Result<R, Error> {
        let mark = self.group_trail.len();
        self.enter_group(group);
        let result = f(self);
        let mut leftover = None;
        while self.group_trail.len() > mark + 1 {
            let Some((inner, previous)) = self.group_trail.pop() else { break };
            self.current_group = previous;
            if let Some(frames) = self.frames.get_mut(inner.index()) {
                frames.pop();
            }
            tracing::debug!(group = %inner, "exit group (unwound)");
            leftover = Some(inner);
        }
        let exited = self.exit_group(group);
        let value = result?;
        exited?;
        match leftover {
            Some(inner) => {
                Err(Error::fatal(format!("{inner} was still active when {group} ended")).at(&self.location))
            }
            None => Ok(value),
        }
    }

    /// Number of active frames of `group`.
    pub fn activation_depth(&self, group: GroupId) -> usize {
        self.frames.get(group.index()).map_or(0, SmallVec::len)
    }

    pub(crate) fn innermost_frame(&self, group: GroupId) -> Option<&Frame> {
        self.frames.get(group.index()).and_then(|f| f.last())
    }

    pub(crate) fn innermost_frame_mut(&mut self, group: GroupId) -> Option<&mut Frame> {
        self.frames.get_mut(group.index()).and_then(|f| f.last_mut())
    }

    /// Bind a variable in the innermost activation of `group`.
    pub fn declare_group_variable(&mut self, group: GroupId, name: ExpandedName, value: Sequence) -> Result<(), Error> {
        let location = self.location.clone();
        match self.innermost_frame_mut(group) {
            Some(frame) => {
                frame.insert(name, value);
                Ok(())
            }
            None => Err(Error::fatal(format!("{group} is not active; cannot bind ${name}")).at(&location)),
        }
    }

    // ===== rule-local bindings =====

    pub fn declare_local(&mut self, name: ExpandedName, value: Sequence) {
        self.locals.insert(name, value);
    }

    pub fn local(&self, name: &ExpandedName) -> Option<&Sequence> {
        self.locals.get(name)
    }

    /// Swap in a new set of rule-local bindings (e.g. when a rule body starts) and return
    /// the previous one so it can be restored afterwards.
    pub fn replace_locals(&mut self, locals: HashMap<ExpandedName, Sequence>) -> HashMap<ExpandedName, Sequence> {
        std::mem::replace(&mut self.locals, locals)
    }

    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }

    // ===== scope cache =====

    pub fn cached_scope(&self, node: NodeId) -> Option<GroupId> {
        self.scope_cache.get(&node).copied()
    }

    /// Give copied variable references the scope their original resolved to, mapped
    /// through the same copy so references into copied groups land on the copies.
    pub fn remap_scope_cache(&mut self, map: &CopyMap) {
        let inherited: Vec<(NodeId, GroupId)> = map
            .nodes()
            .filter_map(|(old, new)| self.scope_cache.get(&old).map(|g| (new, map.map_group(*g))))
            .collect();
        self.scope_cache.extend(inherited);
    }

    pub fn clear_scope_cache(&mut self) {
        self.scope_cache.clear();
    }

    /// Replace the group table, e.g. after specializations added copied groups.
    pub fn set_groups(&mut self, groups: Arc<GroupTable>) {
        self.groups = groups;
    }

    // ===== diagnostics =====

    /// Route a diagnostic through the sink. `Ok(())` means continue with the fallback value.
    pub fn report(&self, error: Error) -> Result<(), Error> {
        let error = error.at(&self.location);
        if error.is_fatal() {
            tracing::error!(code = %error.code, location = %error.location, "{}", error.message);
            return Err(error);
        }
        self.sink.report(error)
    }
}

/// Builder for [`Context`].
pub struct ContextBuilder {
    groups: Arc<GroupTable>,
    sink: Arc<dyn ErrorSink>,
    location: Location,
    initial_group: Option<GroupId>,
}

impl ContextBuilder {
    pub fn new(groups: Arc<GroupTable>) -> Self {
        Self { groups, sink: Arc::new(FatalSink), location: Location::default(), initial_group: None }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Enter `group` (and nothing else) when the context is built.
    pub fn with_initial_group(mut self, group: GroupId) -> Self {
        self.initial_group = Some(group);
        self
    }

    pub fn build(self) -> Context {
        let mut ctx = Context {
            stack: AncestorStack::new(),
            position: 1,
            current_group: None,
            group_trail: Vec::new(),
            locals: HashMap::new(),
            frames: Vec::new(),
            groups: self.groups,
            scope_cache: HashMap::new(),
            sink: self.sink,
            location: self.location,
        };
        if let Some(group) = self.initial_group {
            ctx.enter_group(group);
        }
        ctx
    }
}
