//! Template rules and priority-based selection.
//!
//! A rule pairs a pattern with a priority, the group that declares it and its declaration
//! index. Union patterns are split into one rule per alternative so every alternative keeps
//! its own default priority. The table is kept ordered by descending priority and then by
//! descending declaration index, so the first matching rule is the best one.
use crate::ast::{Ast, NodeId};
use crate::context::Context;
use crate::group::GroupId;
use crate::runtime::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRule {
    pub pattern: NodeId,
    pub priority: f64,
    pub group: GroupId,
    /// Declaration order; alternatives of one union share the index of their declaration.
    pub index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<TemplateRule>,
    declarations: usize,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a rule in `group`. Without an explicit `priority` every alternative of the
    /// pattern gets its own default priority. Returns the declaration index.
    pub fn add(&mut self, ast: &Ast, pattern: NodeId, priority: Option<f64>, group: GroupId) -> usize {
        let index = self.declarations;
        self.declarations += 1;
        for alternative in ast.alternatives(pattern) {
            let priority = priority.unwrap_or_else(|| ast.priority(alternative));
            self.rules.push(TemplateRule { pattern: alternative, priority, group, index });
        }
        self.rules.sort_by(|a, b| b.priority.total_cmp(&a.priority).then_with(|| b.index.cmp(&a.index)));
        index
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in selection order.
    pub fn rules(&self) -> &[TemplateRule] {
        &self.rules
    }

    /// Highest-priority rule matching at height `top`; ties go to the later declaration.
    /// On success the context position is the one set by the winning pattern; otherwise it
    /// is unchanged.
    pub fn best_match(&self, ast: &Ast, ctx: &mut Context, top: usize) -> Result<Option<&TemplateRule>, Error> {
        self.select(ast, ctx, top, |_| true)
    }

    /// Like [`RuleTable::best_match`], restricted to the rules visible from `from`: those of
    /// `from` itself, of its static ancestors and of the groups directly nested in it.
    pub fn best_match_visible(
        &self,
        ast: &Ast,
        ctx: &mut Context,
        top: usize,
        from: GroupId,
    ) -> Result<Option<&TemplateRule>, Error> {
        let groups = ctx.groups().clone();
        self.select(ast, ctx, top, |rule| {
            groups.is_within(from, rule.group) || groups.parent(rule.group) == Some(from)
        })
    }

    fn select(
        &self,
        ast: &Ast,
        ctx: &mut Context,
        top: usize,
        visible: impl Fn(&TemplateRule) -> bool,
    ) -> Result<Option<&TemplateRule>, Error> {
        let saved = ctx.position();
        for rule in self.rules.iter().filter(|r| visible(r)) {
            ctx.set_position(saved);
            if ast.matches(rule.pattern, ctx, top, true)? {
                tracing::debug!(
                    pattern = %rule.pattern,
                    priority = rule.priority,
                    index = rule.index,
                    position = ctx.position(),
                    "rule selected"
                );
                return Ok(Some(rule));
            }
        }
        ctx.set_position(saved);
        Ok(None)
    }
}
