//! Binary/unary operator algebra (§4.7): a fast path over the builtin
//! kinds, falling back to a same-named overloaded method on an Object
//! operand when neither side is a builtin match.

use crate::coercion::stringify;
use crate::error::{RResult, RuntimeError};
use crate::intern::hash;
use crate::number::Number;
use crate::token::Token;
use crate::value::Value;

fn as_number(v: &Value, token: &Token) -> RResult<Number> {
    match v {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::type_error("Number", token.clone())),
    }
}

/// `Array * Number` repetition (§4.7): the array's elements repeated `n`
/// times in order, `n` truncated toward zero and clamped at 0.
fn repeat_array(items: &[Value], n: Number, token: &Token) -> RResult<Vec<Value>> {
    let count = n.as_f64();
    if !count.is_finite() || count < 0.0 {
        return Err(RuntimeError::new("array repetition count must be a non-negative finite number", token.clone()));
    }
    let count = count as usize;
    let mut out = Vec::with_capacity(items.len().saturating_mul(count));
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

/// Tries the user-overload fallback for a binary operator: a method named
/// exactly `op` on the left operand's Object scope, called with the right
/// operand as its sole argument (§4.7, §9 design notes).
fn overload_fallback(op: &str, a: &Value, b: &Value, token: &Token) -> RResult<Value> {
    if let Value::Object(scope) = a {
        if let Some(Value::Function(f)) = scope.get_own(hash(op)) {
            let mut ctx = crate::eval::RunCtx::new(scope.clone());
            let args = vec![b.clone()];
            return crate::eval::call_function(&f, args, &[], &mut ctx, token);
        }
    }
    Err(RuntimeError::new(format!("no overload of operator `{op}` for these operand types"), token.clone()))
}

pub fn binary(op: &str, a: &Value, b: &Value, token: &Token) -> RResult<Value> {
    match op {
        "==" => return Ok(Value::Boolean(a.value_eq(b))),
        "!=" => return Ok(Value::Boolean(!a.value_eq(b))),
        "===" => return Ok(Value::Boolean(a.pure_eq(b))),
        "!==" => return Ok(Value::Boolean(!a.pure_eq(b))),
        "&&" => return Ok(Value::Boolean(a.truthy() && b.truthy())),
        "||" => return Ok(Value::Boolean(a.truthy() || b.truthy())),
        _ => {}
    }

    if op == "+" {
        if let (Value::String(x), Value::String(y)) = (a, b) {
            return Ok(Value::string(format!("{x}{y}")));
        }
        if let (Value::Array(x), Value::Array(y)) = (a, b) {
            let mut out = x.borrow().clone();
            out.extend(y.borrow().iter().cloned());
            return Ok(Value::array(out));
        }
        if let (Value::Dictionary(x), Value::Dictionary(y)) = (a, b) {
            let mut out = x.borrow().clone();
            out.extend(y.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
            return Ok(Value::dictionary(out));
        }
        // String concatenation with a non-String side renders that side via
        // `toString` rather than going through the Number fast path below.
        if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
            return Ok(Value::string(format!("{}{}", stringify(a), stringify(b))));
        }
    }

    if op == "*" {
        if let (Value::Array(x), Value::Number(n)) = (a, b) {
            return Ok(Value::array(repeat_array(&x.borrow(), *n, token)?));
        }
        if let (Value::Number(n), Value::Array(x)) = (a, b) {
            return Ok(Value::array(repeat_array(&x.borrow(), *n, token)?));
        }
    }

    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        let r = match op {
            "+" => *x + *y,
            "-" => *x - *y,
            "*" => *x * *y,
            "/" => *x / *y,
            "%" => *x % *y,
            "**" => x.pow(*y),
            "&" => *x & *y,
            "|" => *x | *y,
            "^" => *x ^ *y,
            "<<" => *x << *y,
            ">>" => *x >> *y,
            "<" | "<=" | ">" | ">=" => {
                let ord = x.partial_cmp_numeric(*y).ok_or_else(|| {
                    RuntimeError::new("comparison between non-comparable numbers", token.clone())
                })?;
                let result = match op {
                    "<" => ord.is_lt(),
                    "<=" => ord.is_le(),
                    ">" => ord.is_gt(),
                    _ => ord.is_ge(),
                };
                return Ok(Value::Boolean(result));
            }
            _ => return overload_fallback(op, a, b, token),
        };
        return Ok(Value::Number(r));
    }

    overload_fallback(op, a, b, token)
}

pub fn unary(op: &str, v: &Value, token: &Token) -> RResult<Value> {
    match op {
        "!" => Ok(Value::Boolean(!v.truthy())),
        "-" => Ok(Value::Number(as_number(v, token)?.neg())),
        "+" => Ok(Value::Number(as_number(v, token)?)),
        "~" => Ok(Value::Number(as_number(v, token)?.bitnot())),
        _ => Err(RuntimeError::new(format!("unknown unary operator `{op}`"), token.clone())),
    }
}

/// `CallOpI` (§4.5): invokes a builtin operator by its numeric id rather
/// than by name, used when the parser has already resolved a fixed
/// arithmetic/comparison op to a stable index (e.g. inside a constant-fold
/// speculative re-evaluation). The mapping mirrors the order operators are
/// declared in the lexer's operator table.
const OP_NAMES: &[&str] =
    &["+", "-", "*", "/", "%", "**", "==", "!=", "<", "<=", ">", ">=", "&&", "||", "&", "|", "^", "<<", ">>"];

pub fn call_by_id(id: u32, args: &[Value], token: &Token) -> RResult<Value> {
    let name = OP_NAMES
        .get(id as usize)
        .ok_or_else(|| RuntimeError::new(format!("unknown operator id {id}"), token.clone()))?;
    match args {
        [a, b] => binary(name, a, b, token),
        [a] => unary(name, a, token),
        _ => Err(RuntimeError::new("operator call with an unsupported arity", token.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition_stays_integer() {
        let r = binary("+", &Value::Number(Number::Integer(2)), &Value::Number(Number::Integer(3)), &dummy()).unwrap();
        assert!(matches!(r, Value::Number(Number::Integer(5))));
    }

    #[test]
    fn string_concatenation() {
        let r = binary("+", &Value::string("a"), &Value::string("b"), &dummy()).unwrap();
        match r {
            Value::String(s) => assert_eq!(&*s, "ab"),
            _ => panic!("expected a string"),
        }
    }

    #[test]
    fn logical_and_short_circuits_on_truthiness_not_type() {
        let r = binary("&&", &Value::Boolean(true), &Value::Number(Number::Integer(0)), &dummy()).unwrap();
        assert!(matches!(r, Value::Boolean(false)));
    }

    #[test]
    fn string_plus_number_concatenates_via_tostring_on_either_side() {
        let r = binary("+", &Value::string("x"), &Value::Number(Number::Integer(1)), &dummy()).unwrap();
        match r {
            Value::String(s) => assert_eq!(&*s, "x1"),
            _ => panic!("expected a string"),
        }
        let r = binary("+", &Value::Number(Number::Integer(1)), &Value::string("x"), &dummy()).unwrap();
        match r {
            Value::String(s) => assert_eq!(&*s, "1x"),
            _ => panic!("expected a string"),
        }
    }

    #[test]
    fn array_times_number_repeats_its_elements() {
        let arr = Value::array(vec![Value::Number(Number::Integer(1)), Value::Number(Number::Integer(2))]);
        let r = binary("*", &arr, &Value::Number(Number::Integer(3)), &dummy()).unwrap();
        let Value::Array(items) = r else { panic!("expected an array") };
        let got: Vec<i64> = items
            .borrow()
            .iter()
            .map(|v| match v {
                Value::Number(Number::Integer(i)) => *i,
                _ => panic!("expected an integer"),
            })
            .collect();
        assert_eq!(got, vec![1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn dictionary_plus_dictionary_merges_right_biased() {
        let mut left = ahash::AHashMap::new();
        left.insert("a".to_string(), Value::Number(Number::Integer(1)));
        left.insert("b".to_string(), Value::Number(Number::Integer(2)));
        let mut right = ahash::AHashMap::new();
        right.insert("b".to_string(), Value::Number(Number::Integer(99)));
        right.insert("c".to_string(), Value::Number(Number::Integer(3)));
        let r = binary("+", &Value::dictionary(left), &Value::dictionary(right), &dummy()).unwrap();
        let Value::Dictionary(d) = r else { panic!("expected a dictionary") };
        let d = d.borrow();
        assert!(matches!(d.get("a"), Some(Value::Number(Number::Integer(1)))));
        assert!(matches!(d.get("b"), Some(Value::Number(Number::Integer(99)))));
        assert!(matches!(d.get("c"), Some(Value::Number(Number::Integer(3)))));
    }

    fn dummy() -> Token {
        Token::eof(std::rc::Rc::from("<test>"))
    }
}
