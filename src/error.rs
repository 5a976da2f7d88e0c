//! All error-related types: a `SourceError` trait for rendering an error
//! against its originating source text, `SourceErrorWrapper<E>` to carry
//! the text alongside the error, and `WithSource<E>` as the public alias.
//! This core follows a "first error wins" propagation policy: `WithSource`
//! always carries exactly one error, not a collection.

use crate::util::Pos;
use serde::Serialize;
use std::fmt::{self, Debug, Display, Formatter};
use thiserror::Error;

/// A trait for any error that originates in source code. Formatting an
/// error needs a symbol table to render type/field names, so `fmt_msg`
/// takes one explicitly rather than baking display strings in at
/// construction time.
pub trait SourceError: 'static + Send + Sync + Debug + Serialize {
    fn fmt_msg(&self, f: &mut Formatter<'_>) -> fmt::Result;
}

/// A static-semantic error raised by the type-checker/translator. Both
/// variants render through the same `TypeError:<pos>: <message>` prefix
/// — the distinction is which rule rejected the program, not the
/// wire format.
#[derive(Clone, Debug, Serialize)]
pub enum CompileError {
    /// Use of an unbound identifier, field, or type name.
    Undefined { message: String },
    /// Any other static-semantic mismatch: type mismatch, arity mismatch,
    /// break outside a loop, non-integer condition/subscript/bound,
    /// non-unit loop body, assignment to a read-only variable, a type-alias
    /// cycle, and so on.
    Type { message: String },
}

impl CompileError {
    pub fn undefined(message: impl Into<String>) -> Self {
        CompileError::Undefined {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        CompileError::Type {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CompileError::Undefined { message } | CompileError::Type { message } => message,
        }
    }
}

impl SourceError for CompileError {
    fn fmt_msg(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Pairs a [`SourceError`] with the position that caused it. On its own,
/// this can be formatted without any other context.
#[derive(Clone, Debug, Error, Serialize)]
pub struct SourceErrorWrapper<E: SourceError> {
    error: E,
    pos: Pos,
}

impl<E: SourceError> SourceErrorWrapper<E> {
    pub fn new(error: E, pos: Pos) -> Self {
        Self { error, pos }
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn error(&self) -> &E {
        &self.error
    }
}

impl<E: SourceError> Display for SourceErrorWrapper<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "TypeError:{}: ", self.pos)?;
        self.error.fmt_msg(f)
    }
}

/// Wraps the single error that aborted a compilation, along with the source
/// text it was found in (kept around for any caller that wants to render a
/// highlighted snippet; this core itself never does).
#[derive(Clone, Debug, Error, Serialize)]
pub struct WithSource<E: SourceError> {
    error: SourceErrorWrapper<E>,
    #[serde(skip)]
    source: String,
}

impl<E: SourceError> WithSource<E> {
    pub fn new(error: SourceErrorWrapper<E>, source: String) -> Self {
        Self { error, source }
    }

    pub fn error(&self) -> &SourceErrorWrapper<E> {
        &self.error
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl<E: SourceError> Display for WithSource<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}
