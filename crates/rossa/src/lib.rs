#![doc = include_str!("../../../README.md")]

mod ast;
mod coercion;
mod error;
mod eval;
mod extension;
mod function;
mod instruction;
mod intern;
mod kind;
mod lexer;
mod number;
mod operators;
mod parser;
mod scope;
mod signature;
mod stdlib;
mod token;
mod value;

pub use crate::coercion::stringify;
pub use crate::error::{RResult, RuntimeError, StackFrame};
pub use crate::eval::Flow;
pub use crate::extension::{is_registered as is_extension_registered, register as register_extension};
pub use crate::function::FunctionValue;
pub use crate::kind::TypeCode;
pub use crate::number::Number;
pub use crate::scope::ScopeRef;
pub use crate::token::Token;
pub use crate::value::Value;

use crate::ast::Node;
use crate::eval::RunCtx;

/// A standing interpreter: one root [`ScopeRef`] plus the machinery to
/// lex/parse/fold/evaluate source against it repeatedly (§4.5, §6.3) — the
/// REPL's and the one-shot file runner's shared foundation.
pub struct Interpreter {
    root: ScopeRef,
}

impl Interpreter {
    /// A fresh interpreter with the `"standard"` extension library
    /// registered (§6.3: loaded unless explicitly skipped).
    #[must_use]
    pub fn new() -> Self {
        stdlib::register_all();
        Interpreter { root: ScopeRef::root() }
    }

    /// A fresh interpreter with no standard library registered (§6.3:
    /// "an option to skip loading the standard library") — `extern`
    /// declarations against `"standard"` will fail to resolve.
    #[must_use]
    pub fn without_stdlib() -> Self {
        Interpreter { root: ScopeRef::root() }
    }

    #[must_use]
    pub fn root_scope(&self) -> &ScopeRef {
        &self.root
    }

    /// Lexes, parses, constant-folds, and evaluates `source` against this
    /// interpreter's root scope, returning the value of its last
    /// statement (§4.5's `Sequence` semantics govern the result, as for
    /// any top-level block).
    pub fn run(&mut self, filename: &str, source: &str) -> RResult<Value> {
        let node: Node = parser::parse_source(filename, source)?.fold();
        let instr = node.generate();
        let mut ctx = RunCtx::new(self.root.clone());
        match eval::eval_instruction(&instr, &mut ctx)? {
            Flow::Plain(v) | Flow::Return(v) | Flow::Refer(v) => Ok(v),
            Flow::Break | Flow::Continue => Err(RuntimeError::new("break/continue outside a loop", instr.token.clone())),
        }
    }

    /// Reads `path` and runs its contents (§6.3: "reads a source file
    /// path"). Relative paths resolve against the process's current
    /// directory, matching `load`'s own resolution rule (§4.5).
    pub fn run_file(&mut self, path: &str) -> RResult<Value> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::new(format!("cannot read `{path}`: {e}"), Token::eof(std::rc::Rc::from(path)))
        })?;
        self.run(path, &contents)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_arithmetic_to_a_value() {
        let mut interp = Interpreter::without_stdlib();
        let v = interp.run("<test>", "1 + 2;").unwrap();
        assert!(matches!(v, Value::Number(n) if n.as_f64() == 3.0));
    }

    #[test]
    fn scope_persists_across_run_calls() {
        let mut interp = Interpreter::without_stdlib();
        interp.run("<test>", "var x = 10;").unwrap();
        let v = interp.run("<test>", "x + 5;").unwrap();
        assert!(matches!(v, Value::Number(n) if n.as_f64() == 15.0));
    }

    #[test]
    fn uncaught_throw_is_an_error() {
        let mut interp = Interpreter::without_stdlib();
        assert!(interp.run("<test>", "throw \"boom\";").is_err());
    }
}
