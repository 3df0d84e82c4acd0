//! The built-in extension library registered under `"standard"` (§6.2,
//! §9 design notes: "extension-loading code is out of scope, the core
//! only reads"). A handful of the host callbacks a freshly started
//! interpreter needs to be useful at all — output, basic math, wall-clock
//! time — grounded in the source language's own standard library.
//!
//! Registered lazily by [`crate::Interpreter::new`]; a caller that wants a
//! bare core (no ambient I/O/math surface) can skip it (§6.3: "an option
//! to skip loading the standard library").

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{RResult, RuntimeError};
use crate::extension;
use crate::number::Number;
use crate::token::Token;
use crate::value::Value;

fn arg_number(args: &[Value], i: usize) -> RResult<Number> {
    match args.get(i) {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(RuntimeError::new(format!("standard: expected a Number argument at index {i}"), Token::eof(std::rc::Rc::from("<standard>")))),
    }
}

fn arg_string(args: &[Value], i: usize) -> RResult<std::rc::Rc<str>> {
    match args.get(i) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(RuntimeError::new(format!("standard: expected a String argument at index {i}"), Token::eof(std::rc::Rc::from("<standard>")))),
    }
}

fn unary_math(name: &'static str, f: impl Fn(f64) -> f64 + 'static) {
    extension::register("standard", name, move |args| {
        Ok(Value::Number(Number::Double(f(arg_number(args, 0)?.as_f64()))))
    });
}

/// Registers the `"standard"` library's callbacks. Idempotent: calling it
/// twice just replaces each entry with an identical one.
pub fn register_all() {
    extension::register("standard", "puts", |args| {
        let s = arg_string(args, 0)?;
        print!("{s}");
        std::io::stdout().flush().ok();
        Ok(Value::Nil)
    });

    extension::register("standard", "timeMS", |_args| {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Ok(Value::Number(Number::Integer(i64::try_from(now.as_millis()).unwrap_or(i64::MAX))))
    });

    extension::register("standard", "floor", |args| Ok(Value::Number(Number::Double(arg_number(args, 0)?.as_f64().floor()))));
    extension::register("standard", "ceil", |args| Ok(Value::Number(Number::Double(arg_number(args, 0)?.as_f64().ceil()))));
    extension::register("standard", "round", |args| Ok(Value::Number(Number::Double(arg_number(args, 0)?.as_f64().round()))));
    extension::register("standard", "sqrt", |args| Ok(Value::Number(Number::Double(arg_number(args, 0)?.as_f64().sqrt()))));

    unary_math("sin", f64::sin);
    unary_math("cos", f64::cos);
    unary_math("tan", f64::tan);
    unary_math("asin", f64::asin);
    unary_math("acos", f64::acos);
    unary_math("atan", f64::atan);
    unary_math("log", f64::ln);

    extension::register("standard", "exit", |args| {
        let code = args.first().map_or(0, |v| match v {
            Value::Number(n) => n.as_f64() as i32,
            _ => 0,
        });
        std::process::exit(code);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_rounds_toward_negative_infinity() {
        register_all();
        let result = extension::call("standard", "floor", vec![Value::Number(Number::Double(1.9))], &Token::eof(std::rc::Rc::from("<test>"))).unwrap();
        assert!(matches!(result, Value::Number(n) if n.as_f64() == 1.0));
    }

    #[test]
    fn puts_accepts_a_string_argument() {
        register_all();
        let result = extension::call("standard", "puts", vec![Value::string("")], &Token::eof(std::rc::Rc::from("<test>"))).unwrap();
        assert!(matches!(result, Value::Nil));
    }
}
