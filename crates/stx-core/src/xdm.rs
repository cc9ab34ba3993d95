//! Value and sequence model.
//!
//! Values are created per evaluation. A sequence owns its items; the empty sequence is the
//! "empty" value. Accessors coerce on demand:
//!
//! | from \ to | boolean | number | string |
//! |---|---|---|---|
//! | empty | `false` | `NaN` | `""` |
//! | boolean | itself | 1 / 0 | `"true"` / `"false"` |
//! | number | `!= 0` and not `NaN` | itself | [`format_number`] |
//! | string | non-empty | [`parse_number`] | itself |
//! | node | `true` | number of its text | its text |
use core::fmt;
use std::sync::Arc;

use itertools::Itertools;
use smallvec::SmallVec;

use crate::model::NodeRef;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self { ns_uri, local: local.into() }
    }

    /// A name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self { ns_uri: None, local: local.into() }
    }

    pub fn ns(ns_uri: impl Into<String>, local: impl Into<String>) -> Self {
        Self { ns_uri: Some(ns_uri.into()), local: local.into() }
    }

    pub fn ns_uri(&self) -> &str {
        self.ns_uri.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) if !ns.is_empty() => write!(f, "Q{{{ns}}}{}", self.local),
            _ => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    String(Arc<str>),
    Node(NodeRef),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Node(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Node(n) => parse_number(&n.string_value()),
        }
    }

    pub fn string_value(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Node(n) => n.string_value(),
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Name of the value's kind, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Node(_) => "node",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<NodeRef> for Value {
    fn from(n: NodeRef) -> Self {
        Value::Node(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Node(n) => write!(f, "<{}>", n.kind()),
            other => f.write_str(&other.string_value()),
        }
    }
}

/// Ordered sequence of values. Most sequences hold a single item, so that one lives inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence(SmallVec<[Value; 1]>);

impl Sequence {
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    pub fn one(value: impl Into<Value>) -> Self {
        let mut items = SmallVec::new();
        items.push(value.into());
        Self(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    /// Concatenate `other` after this sequence.
    pub fn append(&mut self, other: Sequence) {
        self.0.extend(other.0);
    }

    pub fn to_boolean(&self) -> bool {
        match self.0.as_slice() {
            [] => false,
            [single] => single.to_boolean(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        self.first().map_or(f64::NAN, Value::to_number)
    }

    pub fn string_value(&self) -> String {
        self.first().map(Value::string_value).unwrap_or_default()
    }

    /// String values of all items separated by `sep`.
    pub fn join(&self, sep: &str) -> String {
        self.0.iter().map(Value::string_value).join(sep)
    }

    /// The number held by a single-item numeric sequence.
    pub fn as_single_number(&self) -> Option<f64> {
        match self.0.as_slice() {
            [Value::Number(n)] => Some(*n),
            _ => None,
        }
    }
}

impl From<Value> for Sequence {
    fn from(v: Value) -> Self {
        Sequence::one(v)
    }
}

impl From<Vec<Value>> for Sequence {
    fn from(v: Vec<Value>) -> Self {
        Self(SmallVec::from_vec(v))
    }
}

impl FromIterator<Value> for Sequence {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Sequence {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Value;
    type IntoIter = core::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Canonical string form of a number: `NaN`, `Infinity`, `-Infinity`, integral values
/// without a fraction, everything else in shortest round-trip decimal notation.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        // covers -0
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e18 {
        #[allow(clippy::cast_possible_truncation)]
        return (n as i64).to_string();
    }
    n.to_string()
}

/// Parse the number lexical form: optional whitespace, optional `-`, digits with an optional
/// fraction. Anything else (exponents, `INF`, `+`) is `NaN`.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    let body = t.strip_prefix('-').unwrap_or(t);
    let mut digits = 0usize;
    let mut dots = 0usize;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return f64::NAN,
        }
    }
    if digits == 0 || dots > 1 {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}
