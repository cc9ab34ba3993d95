//! Error model and diagnostic sinks.
//!
//! Every condition raised while evaluating an expression is reported through a single
//! [`ErrorSink`]. The sink decides whether the run continues with the documented fallback
//! value (`Ok(())`) or aborts (`Err(error)`), so the recoverability policy is the same for
//! all node kinds. Pattern matching never reports "stack too shallow"; that is a plain `false`.
use core::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::xdm::ExpandedName;

/// Source location of the instruction currently being executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location {
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(system_id: impl Into<String>, line: u32, column: u32) -> Self {
        Self { public_id: None, system_id: Some(system_id.into()), line, column }
    }

    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.public_id = Some(public_id.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.system_id.as_deref().or(self.public_id.as_deref()).unwrap_or("<unknown>");
        write!(f, "{id}:{}:{}", self.line, self.column)
    }
}

/// Codes emitted by the engine. XPath codes are reused where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    XPST0008, // undeclared variable
    XPST0017, // unknown function or arity
    XPTY0004, // type mismatch (non-node step context, stale node, ...)
    FORG0006, // invalid argument value
    STXI0001, // project specific: node kind cannot act in the requested role
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            XPST0008 => "err:XPST0008",
            XPST0017 => "err:XPST0017",
            XPTY0004 => "err:XPTY0004",
            FORG0006 => "err:FORG0006",
            STXI0001 => "err:STXI0001",
            Unknown => "err:UNKNOWN",
        }
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s {
            "err:XPST0008" => XPST0008,
            "err:XPST0017" => XPST0017,
            "err:XPTY0004" => XPTY0004,
            "err:FORG0006" => FORG0006,
            "err:STXI0001" => STXI0001,
            _ => Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Compiler defect; the run always aborts.
    Fatal,
    /// Data error; the sink may let the run continue with a fallback value.
    Recoverable,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{location}: {message} ({code})")]
pub struct Error {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
}

impl Error {
    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self { code, severity: Severity::Recoverable, message: msg.into(), location: Location::default() }
    }

    /// A node was asked to act in a role its kind does not support.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self { code: ErrorCode::STXI0001, severity: Severity::Fatal, message: msg.into(), location: Location::default() }
    }

    pub fn undeclared_variable(name: &ExpandedName) -> Self {
        Self::from_code(ErrorCode::XPST0008, format!("undeclared variable ${name}"))
    }

    pub fn at(mut self, location: &Location) -> Self {
        self.location = location.clone();
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Receives every diagnostic raised during evaluation.
///
/// Returning `Ok(())` lets execution continue with the documented fallback (usually the empty
/// sequence); returning `Err` aborts the run. Fatal errors abort regardless of the answer.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: Error) -> Result<(), Error>;
}

/// Treats every diagnostic as fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct FatalSink;

impl ErrorSink for FatalSink {
    fn report(&self, error: Error) -> Result<(), Error> {
        Err(error)
    }
}

/// Logs recoverable diagnostics and continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientSink;

impl ErrorSink for LenientSink {
    fn report(&self, error: Error) -> Result<(), Error> {
        if error.is_fatal() {
            return Err(error);
        }
        tracing::warn!(code = %error.code, location = %error.location, "{}", error.message);
        Ok(())
    }
}

/// Records recoverable diagnostics and continues. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    errors: Arc<Mutex<Vec<Error>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.errors().iter().map(|e| e.code).collect()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, error: Error) -> Result<(), Error> {
        if error.is_fatal() {
            return Err(error);
        }
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).push(error);
        Ok(())
    }
}
