//! Compiled pattern/expression trees.
//!
//! All nodes of a compiled transformation live in one [`Ast`] arena and are addressed by
//! [`NodeId`]. A node has a kind, up to two children (used both by binary operators and by
//! path steps), a default priority and a constant-ness flag, both computed when the node is
//! added. The arena holds no run state: variable scope caches live in the
//! [`Context`](crate::context::Context), so one `Ast` can serve concurrent runs.
//!
//! The two operations every node supports, `matches` and `evaluate`, are in [`matching`] and
//! [`eval`]; [`copy`] duplicates subtrees for specializations and [`fold`] replaces constant
//! subtrees by precomputed values.
use core::fmt;
use std::sync::Arc;

use crate::functions::FunctionLibrary;
use crate::xdm::{ExpandedName, Sequence, format_number};

mod copy;
mod eval;
mod fold;
mod matching;

pub use copy::CopyMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeKind {
    // steps
    Root,            // /
    Child,           // left/right
    Descendant,      // left//right
    Union,           // left|right
    // element tests
    Name(ExpandedName),
    Wildcard,              // *
    NsWildcard(String),    // p:*
    LocalWildcard(String), // *:local
    // kind tests
    AnyNode, // node()
    Text,    // text()
    CData,   // cdata()
    Comment, // comment()
    ProcessingInstruction(Option<String>),
    // attribute tests
    AttrName(ExpandedName),
    AttrWildcard,
    AttrNsWildcard(String),
    AttrLocalWildcard(String),
    // expressions
    FunctionCall(ExpandedName), // arguments: left, chained through List
    Predicate,                  // left[right]
    Number(f64),
    String(Arc<str>),
    Arith(ArithOp),
    Negate,
    Logic(LogicOp),
    Compare(ComparisonOp),
    Sequence, // left, right
    List,     // argument separator
    Avt,      // attribute value template part chain
    VarRef(ExpandedName),
    ContextItem, // .
    Parent,      // ..
    Value(Arc<Sequence>),
}

impl TreeKind {
    /// Human readable name used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TreeKind::Root => "root step '/'".to_string(),
            TreeKind::Child => "child step '/'".to_string(),
            TreeKind::Descendant => "descendant step '//'".to_string(),
            TreeKind::Union => "union '|'".to_string(),
            TreeKind::Name(n) => format!("name test '{n}'"),
            TreeKind::Wildcard => "wildcard '*'".to_string(),
            TreeKind::NsWildcard(ns) => format!("namespace wildcard '{{{ns}}}*'"),
            TreeKind::LocalWildcard(l) => format!("local wildcard '*:{l}'"),
            TreeKind::AnyNode => "kind test 'node()'".to_string(),
            TreeKind::Text => "kind test 'text()'".to_string(),
            TreeKind::CData => "kind test 'cdata()'".to_string(),
            TreeKind::Comment => "kind test 'comment()'".to_string(),
            TreeKind::ProcessingInstruction(t) => {
                format!("kind test 'processing-instruction({})'", t.as_deref().unwrap_or(""))
            }
            TreeKind::AttrName(n) => format!("attribute test '@{n}'"),
            TreeKind::AttrWildcard => "attribute wildcard '@*'".to_string(),
            TreeKind::AttrNsWildcard(ns) => format!("attribute namespace wildcard '@{{{ns}}}*'"),
            TreeKind::AttrLocalWildcard(l) => format!("attribute local wildcard '@*:{l}'"),
            TreeKind::FunctionCall(n) => format!("function call '{n}()'"),
            TreeKind::Predicate => "predicate '[]'".to_string(),
            TreeKind::Number(n) => format!("number literal {}", format_number(*n)),
            TreeKind::String(s) => format!("string literal '{s}'"),
            TreeKind::Arith(op) => format!("operator '{}'", arith_symbol(*op)),
            TreeKind::Negate => "unary minus".to_string(),
            TreeKind::Logic(LogicOp::And) => "operator 'and'".to_string(),
            TreeKind::Logic(LogicOp::Or) => "operator 'or'".to_string(),
            TreeKind::Compare(op) => format!("operator '{}'", comparison_symbol(*op)),
            TreeKind::Sequence => "sequence ','".to_string(),
            TreeKind::List => "argument list".to_string(),
            TreeKind::Avt => "attribute value template".to_string(),
            TreeKind::VarRef(n) => format!("variable reference '${n}'"),
            TreeKind::ContextItem => "context item '.'".to_string(),
            TreeKind::Parent => "parent '..'".to_string(),
            TreeKind::Value(_) => "precomputed value".to_string(),
        }
    }
}

fn arith_symbol(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "div",
        ArithOp::Mod => "mod",
    }
}

fn comparison_symbol(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "!=",
        ComparisonOp::Lt => "<",
        ComparisonOp::Le => "<=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Ge => ">=",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub kind: TreeKind,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub priority: f64,
    pub constant: bool,
}

/// Default priorities assigned to patterns. The defaults keep the conventional ordering in
/// which a specific test always outranks a wildcard matching the same event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityPolicy {
    /// Composite patterns (steps, predicates).
    pub default: f64,
    /// Qualified name tests, attribute name tests, `processing-instruction('t')`.
    pub name: f64,
    /// `p:*`, `*:local` and their attribute forms.
    pub partial_wildcard: f64,
    /// `*`, `@*`, `node()`, `text()`, `cdata()`, `comment()`, `processing-instruction()`.
    pub wildcard: f64,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self { default: 0.5, name: 0.0, partial_wildcard: -0.25, wildcard: -0.5 }
    }
}

impl PriorityPolicy {
    fn priority_of(&self, kind: &TreeKind) -> f64 {
        match kind {
            TreeKind::Name(_) | TreeKind::AttrName(_) | TreeKind::ProcessingInstruction(Some(_)) => self.name,
            TreeKind::NsWildcard(_)
            | TreeKind::LocalWildcard(_)
            | TreeKind::AttrNsWildcard(_)
            | TreeKind::AttrLocalWildcard(_) => self.partial_wildcard,
            TreeKind::Wildcard
            | TreeKind::AttrWildcard
            | TreeKind::AnyNode
            | TreeKind::Text
            | TreeKind::CData
            | TreeKind::Comment
            | TreeKind::ProcessingInstruction(None) => self.wildcard,
            _ => self.default,
        }
    }
}

/// Node arena of one compiled transformation.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<TreeNode>,
    policy: PriorityPolicy,
    functions: Arc<FunctionLibrary>,
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            policy: PriorityPolicy::default(),
            functions: Arc::new(FunctionLibrary::with_defaults()),
        }
    }

    /// Use a different priority policy for nodes added from now on.
    pub fn with_policy(mut self, policy: PriorityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_functions(mut self, functions: Arc<FunctionLibrary>) -> Self {
        self.functions = functions;
        self
    }

    pub fn functions(&self) -> &Arc<FunctionLibrary> {
        &self.functions
    }

    pub fn policy(&self) -> &PriorityPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    ///
    /// If `id` was not produced by this arena.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &TreeKind {
        &self.node(id).kind
    }

    pub fn priority(&self, id: NodeId) -> f64 {
        self.node(id).priority
    }

    pub fn is_constant(&self, id: NodeId) -> bool {
        self.node(id).constant
    }

    pub fn describe(&self, id: NodeId) -> String {
        self.kind(id).describe()
    }

    fn add(&mut self, kind: TreeKind, left: Option<NodeId>, right: Option<NodeId>) -> NodeId {
        let constant = self.infer_constant(&kind, left, right);
        let priority = self.policy.priority_of(&kind);
        self.push(TreeNode { kind, left, right, priority, constant })
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    /// Constant iff the node itself does not depend on the stack, a variable or the
    /// position, and all of its children are constant.
    fn infer_constant(&self, kind: &TreeKind, left: Option<NodeId>, right: Option<NodeId>) -> bool {
        let context_free = match kind {
            TreeKind::Number(_)
            | TreeKind::String(_)
            | TreeKind::Value(_)
            | TreeKind::Arith(_)
            | TreeKind::Negate
            | TreeKind::Logic(_)
            | TreeKind::Compare(_)
            | TreeKind::Sequence
            | TreeKind::List
            | TreeKind::Avt => true,
            TreeKind::FunctionCall(name) => self.functions.is_pure(name, self.count_args(left)),
            _ => false,
        };
        context_free && [left, right].into_iter().flatten().all(|c| self.node(c).constant)
    }

    // ===== constructors used by the compiler =====

    pub fn root(&mut self) -> NodeId {
        self.add(TreeKind::Root, None, None)
    }

    pub fn child(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::Child, Some(left), Some(right))
    }

    pub fn descendant(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::Descendant, Some(left), Some(right))
    }

    pub fn union(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::Union, Some(left), Some(right))
    }

    pub fn name(&mut self, name: ExpandedName) -> NodeId {
        self.add(TreeKind::Name(name), None, None)
    }

    pub fn wildcard(&mut self) -> NodeId {
        self.add(TreeKind::Wildcard, None, None)
    }

    pub fn ns_wildcard(&mut self, ns_uri: impl Into<String>) -> NodeId {
        self.add(TreeKind::NsWildcard(ns_uri.into()), None, None)
    }

    pub fn local_wildcard(&mut self, local: impl Into<String>) -> NodeId {
        self.add(TreeKind::LocalWildcard(local.into()), None, None)
    }

    pub fn any_node(&mut self) -> NodeId {
        self.add(TreeKind::AnyNode, None, None)
    }

    pub fn text(&mut self) -> NodeId {
        self.add(TreeKind::Text, None, None)
    }

    pub fn cdata(&mut self) -> NodeId {
        self.add(TreeKind::CData, None, None)
    }

    pub fn comment(&mut self) -> NodeId {
        self.add(TreeKind::Comment, None, None)
    }

    pub fn processing_instruction(&mut self, target: Option<&str>) -> NodeId {
        self.add(TreeKind::ProcessingInstruction(target.map(str::to_string)), None, None)
    }

    pub fn attr(&mut self, name: ExpandedName) -> NodeId {
        self.add(TreeKind::AttrName(name), None, None)
    }

    pub fn attr_wildcard(&mut self) -> NodeId {
        self.add(TreeKind::AttrWildcard, None, None)
    }

    pub fn attr_ns_wildcard(&mut self, ns_uri: impl Into<String>) -> NodeId {
        self.add(TreeKind::AttrNsWildcard(ns_uri.into()), None, None)
    }

    pub fn attr_local_wildcard(&mut self, local: impl Into<String>) -> NodeId {
        self.add(TreeKind::AttrLocalWildcard(local.into()), None, None)
    }

    /// Function call; the arguments are chained left-to-right through list nodes.
    pub fn call(&mut self, name: ExpandedName, args: &[NodeId]) -> NodeId {
        let chain = args.iter().copied().reduce(|acc, arg| self.add(TreeKind::List, Some(acc), Some(arg)));
        self.add(TreeKind::FunctionCall(name), chain, None)
    }

    pub fn predicate(&mut self, base: NodeId, predicate: NodeId) -> NodeId {
        self.add(TreeKind::Predicate, Some(base), Some(predicate))
    }

    pub fn number(&mut self, n: f64) -> NodeId {
        self.add(TreeKind::Number(n), None, None)
    }

    pub fn string(&mut self, s: &str) -> NodeId {
        self.add(TreeKind::String(Arc::from(s)), None, None)
    }

    pub fn arith(&mut self, op: ArithOp, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::Arith(op), Some(left), Some(right))
    }

    pub fn negate(&mut self, operand: NodeId) -> NodeId {
        self.add(TreeKind::Negate, Some(operand), None)
    }

    pub fn logic(&mut self, op: LogicOp, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::Logic(op), Some(left), Some(right))
    }

    pub fn compare(&mut self, op: ComparisonOp, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::Compare(op), Some(left), Some(right))
    }

    pub fn sequence(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::Sequence, Some(left), Some(right))
    }

    /// Argument list separator. Normally produced by [`Ast::call`].
    pub fn list(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(TreeKind::List, Some(left), Some(right))
    }

    /// Attribute value template built from literal and expression parts.
    pub fn avt(&mut self, parts: &[NodeId]) -> NodeId {
        let mut chain: Option<NodeId> = None;
        for &part in parts {
            chain = Some(self.add(TreeKind::Avt, chain, Some(part)));
        }
        chain.unwrap_or_else(|| self.add(TreeKind::Avt, None, None))
    }

    pub fn var(&mut self, name: ExpandedName) -> NodeId {
        self.add(TreeKind::VarRef(name), None, None)
    }

    pub fn context_item(&mut self) -> NodeId {
        self.add(TreeKind::ContextItem, None, None)
    }

    pub fn parent(&mut self) -> NodeId {
        self.add(TreeKind::Parent, None, None)
    }

    pub fn value(&mut self, value: Sequence) -> NodeId {
        self.add(TreeKind::Value(Arc::new(value)), None, None)
    }

    // ===== structure helpers =====

    /// Alternatives of a (possibly nested) union, left to right; a non-union is its own
    /// single alternative. Used to split a union pattern into independently prioritized rules.
    pub fn alternatives(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        match (&node.kind, node.left, node.right) {
            (TreeKind::Union, Some(l), Some(r)) => {
                let mut out = self.alternatives(l);
                out.extend(self.alternatives(r));
                out
            }
            _ => vec![id],
        }
    }

    /// Argument expressions of a list chain, in call order.
    pub(crate) fn arguments(&self, chain: Option<NodeId>) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = chain;
        while let Some(id) = cursor {
            let node = self.node(id);
            match (&node.kind, node.left, node.right) {
                (TreeKind::List, left, Some(arg)) => {
                    out.push(arg);
                    cursor = left;
                }
                _ => {
                    out.push(id);
                    cursor = None;
                }
            }
        }
        out.reverse();
        out
    }

    fn count_args(&self, chain: Option<NodeId>) -> usize {
        self.arguments(chain).len()
    }
}
