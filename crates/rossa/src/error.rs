//! Runtime errors and the call-frame stack trace (§6.4, §7).
//!
//! Every error the evaluator can produce — lex, parse, name, type, arity,
//! bounds, user `throw`, or extension failure — collapses into a single
//! [`RuntimeError`] value. The *kind* is conveyed only through the message
//! text (§7: "All are a single runtime-error value internally"); callers
//! that want to distinguish kinds should match on the message, the same
//! way the source localizes messages through a lookup table.

use std::fmt;

use crate::token::Token;

/// Result type alias for anything that can raise a Rossa runtime error,
/// the same shape as the teacher's `RunResult<T>`.
pub type RResult<T> = Result<T, RuntimeError>;

/// A single call-frame, captured at the point a function is entered.
///
/// The chain of frames active when a `throw` (or an internal error) fires
/// is snapshotted onto the [`RuntimeError`] so the host can render a trace
/// (§6.4).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StackFrame {
    /// Name of the function/method active in this frame (empty for the
    /// top-level module frame).
    pub name: String,
    /// The call-site token, used for "called from here" rendering.
    pub at: Token,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<module> ({})", self.at)
        } else {
            write!(f, "{} ({})", self.name, self.at)
        }
    }
}

/// A thrown runtime error: message, offending token, and the frame stack
/// captured at throw time (§6.4).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeError {
    pub message: String,
    pub token: Token,
    pub trace: Vec<StackFrame>,
}

impl RuntimeError {
    #[must_use]
    pub fn new(message: impl Into<String>, token: Token) -> Self {
        RuntimeError { message: message.into(), token, trace: Vec::new() }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: Vec<StackFrame>) -> Self {
        self.trace = trace;
        self
    }

    // --- Constructors for the common error kinds named in §7. Each is a
    // thin wrapper; the "kind" lives only in the message text, as the spec
    // requires, but factoring these out keeps call sites self-documenting
    // and keeps message wording consistent across the evaluator.

    #[must_use]
    pub fn undeclared_variable(name: &str, token: Token) -> Self {
        Self::new(format!("undeclared variable `{name}`"), token)
    }

    #[must_use]
    pub fn type_error(expected: &str, token: Token) -> Self {
        Self::new(format!("expected a value of type {expected}"), token)
    }

    #[must_use]
    pub fn no_overload(name: &str, argc: usize, token: Token) -> Self {
        Self::new(format!("no overload of `{name}` matches {argc} argument(s)"), token)
    }

    #[must_use]
    pub fn not_callable(token: Token) -> Self {
        Self::new("value is not callable", token)
    }

    #[must_use]
    pub fn out_of_bounds(index: i64, len: usize, token: Token) -> Self {
        Self::new(format!("index {index} out of bounds for length {len}"), token)
    }

    #[must_use]
    pub fn no_such_key(key: &str, token: Token) -> Self {
        Self::new(format!("no such key `{key}`"), token)
    }

    #[must_use]
    pub fn malformed_coercion(from: &str, to: &str, token: Token) -> Self {
        Self::new(format!("cannot coerce {from} to {to}"), token)
    }

    #[must_use]
    pub fn user_thrown(message: String, token: Token) -> Self {
        Self::new(message, token)
    }

    #[must_use]
    pub fn extension_not_registered(lib: &str, func: &str, token: Token) -> Self {
        Self::new(format!("extension function `{func}` in library `{lib}` is not registered"), token)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {} ({})", self.message, self.token)?;
        for frame in self.trace.iter().rev() {
            writeln!(f, "  at {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
