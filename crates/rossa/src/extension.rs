//! The extension registry (§6.2, §9 design notes): a global
//! `(library, function)` → host callback map, external to the core
//! evaluator. Stdlib bindings, file I/O, and anything else host-specific
//! are wired in through here rather than being built into the
//! interpreter (§1 Non-goals).
//!
//! Not `Send`/`Sync` — `Value` carries `Rc`, and the language gives no
//! thread-safety guarantees (§1 Non-goals) — so the table is thread-local
//! rather than a global `Mutex`, mirroring [`crate::intern`]'s choice of a
//! process-wide singleton for the one piece of state that *is* safe to
//! share (plain strings).

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::error::{RResult, RuntimeError};
use crate::token::Token;
use crate::value::Value;

pub type ExternFn = dyn Fn(&[Value]) -> RResult<Value>;

thread_local! {
    static REGISTRY: RefCell<AHashMap<(String, String), Rc<ExternFn>>> = RefCell::new(AHashMap::new());
}

/// Registers a host callback under `(library, function)`. Re-registering
/// the same pair replaces the previous callback.
pub fn register(lib: &str, func: &str, f: impl Fn(&[Value]) -> RResult<Value> + 'static) {
    REGISTRY.with(|r| r.borrow_mut().insert((lib.to_string(), func.to_string()), Rc::new(f)));
}

pub fn is_registered(lib: &str, func: &str) -> bool {
    REGISTRY.with(|r| r.borrow().contains_key(&(lib.to_string(), func.to_string())))
}

/// `Extern` instruction dispatch (§4.5). An unregistered `(lib, func)` pair
/// is a runtime error, not a silent no-op — the core never guesses at
/// stdlib behavior.
pub fn call(lib: &str, func: &str, args: Vec<Value>, token: &Token) -> RResult<Value> {
    let callback = REGISTRY.with(|r| r.borrow().get(&(lib.to_string(), func.to_string())).cloned());
    match callback {
        Some(f) => f(&args),
        None => Err(RuntimeError::extension_not_registered(lib, func, token.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_extern_is_an_error() {
        let token = Token::eof(std::rc::Rc::from("<test>"));
        assert!(call("nope", "nope", vec![], &token).is_err());
    }

    #[test]
    fn registered_extern_is_called_with_args() {
        register("math", "double", |args| match args {
            [Value::Number(n)] => Ok(Value::Number(n.mul(crate::number::Number::Integer(2)))),
            _ => Err(RuntimeError::new("expected one Number", Token::eof(std::rc::Rc::from("<test>")))),
        });
        let token = Token::eof(std::rc::Rc::from("<test>"));
        let result = call("math", "double", vec![Value::Number(crate::number::Number::Integer(21))], &token).unwrap();
        assert!(matches!(result, Value::Number(crate::number::Number::Integer(42))));
    }
}
