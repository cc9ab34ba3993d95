pub mod ast;
pub mod compare;
pub mod context;
pub mod functions;
pub mod group;
pub mod model;
pub mod rules;
pub mod runtime;
pub mod scope;
pub mod stack;
pub mod xdm;

pub use ast::{ArithOp, Ast, ComparisonOp, CopyMap, LogicOp, NodeId, PriorityPolicy, TreeKind};
pub use context::{Context, ContextBuilder, DriverState};
pub use functions::{CallCtx, FunctionLibrary, Purity};
pub use group::{GroupId, GroupTable};
pub use model::{Event, NodeKind, NodeRef};
pub use rules::{RuleTable, TemplateRule};
pub use runtime::{CollectingSink, Error, ErrorCode, ErrorSink, FatalSink, LenientSink, Location, Severity};
pub use scope::Scope;
pub use stack::{AncestorStack, PositionKey};
pub use xdm::{ExpandedName, Sequence, Value};
