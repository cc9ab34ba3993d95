//! Function library.
//!
//! Functions are registered by expanded name with an arity range. Each overload also carries
//! its [`Purity`]: a pure function's result depends only on its arguments, which lets calls
//! with constant arguments take part in constant folding. Functions that read the position
//! or the stack are registered as contextual.
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::ComparisonOp;
use crate::compare::compare_values;
use crate::context::Context;
use crate::model::NodeRef;
use crate::runtime::{Error, ErrorCode};
use crate::xdm::{ExpandedName, Sequence, Value};

pub type Arity = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purity {
    Pure,
    Contextual,
}

/// What a function sees of the run: the context (read only) and the stack height the call is
/// evaluated at. The context node is the stack entry at `top - 1`.
pub struct CallCtx<'a> {
    pub context: &'a Context,
    pub top: usize,
}

impl CallCtx<'_> {
    pub fn context_node(&self) -> Option<NodeRef> {
        self.top.checked_sub(1).and_then(|i| self.context.stack().node_ref(i))
    }
}

pub type FunctionImpl = Arc<dyn Fn(&CallCtx<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync>;

#[derive(Clone)]
struct Overload {
    min: Arity,
    max: Option<Arity>,
    purity: Purity,
    func: FunctionImpl,
}

impl Overload {
    fn accepts(&self, arity: Arity) -> bool {
        arity >= self.min && self.max.is_none_or(|m| arity <= m)
    }
}

/// Error type returned by function resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    Unknown(ExpandedName),
    /// Function exists, but not for the requested arity. Lists the bounded arities it has.
    WrongArity { name: ExpandedName, available: Vec<Arity> },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Unknown(name) => write!(f, "unknown function {name}()"),
            ResolveError::WrongArity { name, available } => {
                let arities = itertools::join(available, ", ");
                write!(f, "function {name}() has no overload for this arity (available: {arities})")
            }
        }
    }
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Self {
        Error::from_code(ErrorCode::XPST0017, e.to_string())
    }
}

#[derive(Clone, Default)]
pub struct FunctionLibrary {
    // Overloads per name, most specific first: higher min, then smaller max (None last).
    fns: HashMap<ExpandedName, Vec<Overload>>,
}

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionLibrary").field("functions", &self.fns.len()).finish()
    }
}

impl FunctionLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// The core library: node accessors, string, number, boolean and sequence functions.
    pub fn with_defaults() -> Self {
        let mut lib = Self::new();
        register_defaults(&mut lib);
        lib
    }

    pub fn register_range(
        &mut self,
        name: ExpandedName,
        min: Arity,
        max: Option<Arity>,
        purity: Purity,
        func: FunctionImpl,
    ) {
        let overloads = self.fns.entry(name).or_default();
        overloads.push(Overload { min, max, purity, func });
        overloads.sort_by(|a, b| {
            b.min.cmp(&a.min).then_with(|| match (a.max, b.max) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => core::cmp::Ordering::Less,
                (None, Some(_)) => core::cmp::Ordering::Greater,
                (None, None) => core::cmp::Ordering::Equal,
            })
        });
    }

    /// Register a pure function with an exact arity.
    pub fn register<F>(&mut self, name: ExpandedName, arity: Arity, f: F)
    where
        F: Fn(&CallCtx<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync + 'static,
    {
        self.register_range(name, arity, Some(arity), Purity::Pure, Arc::new(f));
    }

    /// Register a pure function accepting `min_arity` or more arguments.
    pub fn register_variadic<F>(&mut self, name: ExpandedName, min_arity: Arity, f: F)
    where
        F: Fn(&CallCtx<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync + 'static,
    {
        self.register_range(name, min_arity, None, Purity::Pure, Arc::new(f));
    }

    /// Register a function that reads the position or the stack.
    pub fn register_contextual<F>(&mut self, name: ExpandedName, arity: Arity, f: F)
    where
        F: Fn(&CallCtx<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync + 'static,
    {
        self.register_range(name, arity, Some(arity), Purity::Contextual, Arc::new(f));
    }

    fn overload(&self, name: &ExpandedName, arity: Arity) -> Result<&Overload, ResolveError> {
        let Some(candidates) = self.fns.get(name) else {
            return Err(ResolveError::Unknown(name.clone()));
        };
        if let Some(o) = candidates.iter().find(|o| o.accepts(arity)) {
            return Ok(o);
        }
        let mut available: Vec<Arity> =
            candidates.iter().filter_map(|o| o.max.map(|m| o.min..=m)).flatten().collect();
        available.sort_unstable();
        available.dedup();
        Err(ResolveError::WrongArity { name: name.clone(), available })
    }

    pub fn resolve(&self, name: &ExpandedName, arity: Arity) -> Result<&FunctionImpl, ResolveError> {
        self.overload(name, arity).map(|o| &o.func)
    }

    /// Whether a call of `name` with `arity` arguments depends on nothing but its arguments.
    /// Unknown functions are not pure: their calls must stay in the tree to report the error.
    pub fn is_pure(&self, name: &ExpandedName, arity: Arity) -> bool {
        self.overload(name, arity).is_ok_and(|o| o.purity == Purity::Pure)
    }

    pub fn contains(&self, name: &ExpandedName) -> bool {
        self.fns.contains_key(name)
    }
}

// ===== core library =====

fn type_error(msg: impl Into<String>) -> Error {
    Error::from_code(ErrorCode::XPTY0004, msg)
}

/// The node a one-argument accessor applies to: the argument's first item, or the context
/// node when called without arguments. `Ok(None)` for an empty argument.
fn node_argument(ctx: &CallCtx<'_>, args: &[Sequence], function: &str) -> Result<Option<NodeRef>, Error> {
    let Some(arg) = args.first() else {
        return Ok(ctx.context_node());
    };
    match arg.first() {
        None => Ok(None),
        Some(Value::Node(n)) => Ok(Some(n.clone())),
        Some(other) => Err(type_error(format!("{function}() expects a node, got a {}", other.type_name()))),
    }
}

/// String value of the argument, or of the context node when called without arguments.
fn string_argument(ctx: &CallCtx<'_>, args: &[Sequence]) -> String {
    match args.first() {
        Some(arg) => arg.string_value(),
        None => ctx.context_node().map(|n| n.string_value()).unwrap_or_default(),
    }
}

fn number(n: f64) -> Result<Sequence, Error> {
    Ok(Sequence::one(n))
}

fn string(s: impl AsRef<str>) -> Result<Sequence, Error> {
    Ok(Sequence::one(Value::string(s)))
}

fn boolean(b: bool) -> Result<Sequence, Error> {
    Ok(Sequence::one(b))
}

#[allow(clippy::cast_precision_loss)]
fn as_number(n: usize) -> f64 {
    n as f64
}

/// Round half towards positive infinity; NaN and infinities are unchanged.
fn round_half_up(x: f64) -> f64 {
    if x.is_finite() { (x + 0.5).floor() } else { x }
}

fn substring(s: &str, start: f64, len: Option<f64>) -> String {
    let from = round_half_up(start);
    let to = len.map(|l| from + round_half_up(l));
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = as_number(i + 1);
            p >= from && to.is_none_or(|t| p < t)
        })
        .map(|(_, c)| c)
        .collect()
}

fn translate(s: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.iter().position(|f| *f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// Registers both the context form (no arguments) and the one-argument form of an accessor.
fn register_accessor<F>(lib: &mut FunctionLibrary, local: &str, f: F)
where
    F: Fn(&CallCtx<'_>, &[Sequence]) -> Result<Sequence, Error> + Send + Sync + 'static,
{
    let f: FunctionImpl = Arc::new(f);
    lib.register_range(ExpandedName::local(local), 0, Some(0), Purity::Contextual, Arc::clone(&f));
    lib.register_range(ExpandedName::local(local), 1, Some(1), Purity::Pure, f);
}

fn register_defaults(lib: &mut FunctionLibrary) {
    let name = ExpandedName::local;

    // ----- context -----
    lib.register_contextual(name("position"), 0, |ctx, _| number(as_number(ctx.context.position())));
    lib.register_contextual(name("level"), 0, |ctx, _| match ctx.top.checked_sub(1) {
        Some(level) => number(as_number(level)),
        None => Ok(Sequence::empty()),
    });

    // ----- node accessors -----
    register_accessor(lib, "node-kind", |ctx, args| {
        Ok(node_argument(ctx, args, "node-kind")?.map_or_else(Sequence::empty, |n| Sequence::one(n.kind().as_str())))
    });
    register_accessor(lib, "name", |ctx, args| {
        let node = node_argument(ctx, args, "name")?;
        string(node.and_then(|n| n.name().map(ToString::to_string)).unwrap_or_default())
    });
    register_accessor(lib, "local-name", |ctx, args| {
        let node = node_argument(ctx, args, "local-name")?;
        string(node.and_then(|n| n.name().map(|q| q.local.clone())).unwrap_or_default())
    });
    register_accessor(lib, "namespace-uri", |ctx, args| {
        let node = node_argument(ctx, args, "namespace-uri")?;
        string(node.and_then(|n| n.name().map(|q| q.ns_uri().to_string())).unwrap_or_default())
    });

    // ----- conversions -----
    register_accessor(lib, "string", |ctx, args| string(string_argument(ctx, args)));
    register_accessor(lib, "number", |ctx, args| match args.first() {
        Some(arg) => number(arg.to_number()),
        None => number(ctx.context_node().map_or(f64::NAN, |n| Value::Node(n).to_number())),
    });
    lib.register(name("boolean"), 1, |_, args| boolean(args[0].to_boolean()));
    lib.register(name("not"), 1, |_, args| boolean(!args[0].to_boolean()));
    lib.register(name("true"), 0, |_, _| boolean(true));
    lib.register(name("false"), 0, |_, _| boolean(false));

    // ----- strings -----
    lib.register_variadic(name("concat"), 2, |_, args| {
        string(args.iter().map(Sequence::string_value).collect::<String>())
    });
    lib.register(name("string-join"), 2, |_, args| string(args[0].join(&args[1].string_value())));
    register_accessor(lib, "string-length", |ctx, args| {
        number(as_number(string_argument(ctx, args).chars().count()))
    });
    register_accessor(lib, "normalize-space", |ctx, args| {
        string(itertools::join(string_argument(ctx, args).split_whitespace(), " "))
    });
    lib.register(name("contains"), 2, |_, args| {
        boolean(args[0].string_value().contains(args[1].string_value().as_str()))
    });
    lib.register(name("starts-with"), 2, |_, args| {
        boolean(args[0].string_value().starts_with(args[1].string_value().as_str()))
    });
    lib.register(name("ends-with"), 2, |_, args| {
        boolean(args[0].string_value().ends_with(args[1].string_value().as_str()))
    });
    lib.register_range(
        name("substring"),
        2,
        Some(3),
        Purity::Pure,
        Arc::new(|_: &CallCtx<'_>, args: &[Sequence]| {
            let len = args.get(2).map(Sequence::to_number);
            string(substring(&args[0].string_value(), args[1].to_number(), len))
        }),
    );
    lib.register(name("substring-before"), 2, |_, args| {
        let (s, sep) = (args[0].string_value(), args[1].string_value());
        string(s.find(sep.as_str()).map_or("", |i| &s[..i]))
    });
    lib.register(name("substring-after"), 2, |_, args| {
        let (s, sep) = (args[0].string_value(), args[1].string_value());
        string(s.find(sep.as_str()).map_or("", |i| &s[i + sep.len()..]))
    });
    lib.register(name("translate"), 3, |_, args| {
        string(translate(&args[0].string_value(), &args[1].string_value(), &args[2].string_value()))
    });
    lib.register(name("upper-case"), 1, |_, args| string(args[0].string_value().to_uppercase()));
    lib.register(name("lower-case"), 1, |_, args| string(args[0].string_value().to_lowercase()));

    // ----- numbers -----
    lib.register(name("floor"), 1, |_, args| number_or_empty(&args[0], f64::floor));
    lib.register(name("ceiling"), 1, |_, args| number_or_empty(&args[0], f64::ceil));
    lib.register(name("round"), 1, |_, args| number_or_empty(&args[0], round_half_up));
    lib.register(name("sum"), 1, |_, args| number(args[0].iter().map(Value::to_number).sum()));

    // ----- sequences -----
    lib.register(name("count"), 1, |_, args| number(as_number(args[0].len())));
    lib.register(name("empty"), 1, |_, args| boolean(args[0].is_empty()));
    lib.register(name("exists"), 1, |_, args| boolean(!args[0].is_empty()));
    lib.register(name("item-at"), 2, |_, args| {
        let n = args[1].to_number();
        if n.fract() != 0.0 || n < 1.0 {
            return Ok(Sequence::empty());
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = n as usize - 1;
        Ok(args[0].get(index).cloned().map_or_else(Sequence::empty, Sequence::one))
    });
    lib.register(name("index-of"), 2, |_, args| {
        let Some(needle) = args[1].first() else {
            return Err(Error::from_code(ErrorCode::FORG0006, "index-of() expects a search item"));
        };
        Ok(args[0]
            .iter()
            .enumerate()
            .filter(|(_, item)| compare_values(item, ComparisonOp::Eq, needle))
            .map(|(i, _)| Value::Number(as_number(i + 1)))
            .collect())
    });
}

fn number_or_empty(arg: &Sequence, f: fn(f64) -> f64) -> Result<Sequence, Error> {
    if arg.is_empty() { Ok(Sequence::empty()) } else { number(f(arg.to_number())) }
}
