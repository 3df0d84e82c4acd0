//! The `->` coercion table (§4.6): converting a [`Value`] to a target
//! [`crate::kind::TypeCode`], and the string-rendering rules shared by
//! `->String`, dictionary key stringification, and `throw` of a non-String.

use ahash::AHashMap;

use crate::error::{RResult, RuntimeError};
use crate::kind::{self, TypeCode};
use crate::number::Number;
use crate::token::Token;
use crate::value::Value;

/// Renders a value the way `->String` and dictionary/array formatting do
/// (§4.6). Not the same as a host `Display` impl: Rossa source syntax
/// (`[...]`, `{...}`) is part of the contract here.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::String(s) => s.to_string(),
        Value::Array(a) => {
            let items: Vec<String> = a.borrow().iter().map(stringify).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Dictionary(d) => {
            let items: Vec<String> = d.borrow().iter().map(|(k, v)| format!("{k}: {}", stringify(v))).collect();
            format!("{{{}}}", items.join(", "))
        }
        Value::Function(f) => format!("<function {}>", crate::intern::dehash(f.name())),
        Value::Object(scope) => format!("<object {}>", crate::intern::dehash(scope.class_name())),
        Value::Type(code) => kind::builtin_name(*code)
            .map(str::to_string)
            .unwrap_or_else(|| crate::intern::dehash(kind::code_to_name(*code))),
        Value::Pointer(_) => "<pointer>".to_string(),
    }
}

#[must_use]
pub fn parse_number(s: &str, token: &Token) -> RResult<Value> {
    let trimmed = s.trim();
    // Binary/hex literals (`0b`/`0x`, either case), matching the lexer's own
    // number grammar (`lex_number`) rather than just decimal/double.
    for (prefix, radix) in [("0b", 2), ("0B", 2), ("0x", 16), ("0X", 16)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return i64::from_str_radix(digits, radix)
                .map(|i| Value::Number(Number::Integer(i)))
                .map_err(|_| RuntimeError::malformed_coercion("String", "Number", token.clone()));
        }
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Value::Number(Number::Integer(i)));
    }
    if let Ok(d) = trimmed.parse::<f64>() {
        return Ok(Value::Number(Number::from(d)));
    }
    Err(RuntimeError::malformed_coercion("String", "Number", token.clone()))
}

/// `value -> target` (§4.6): `target` must evaluate to a [`Value::Type`].
pub fn cast(value: &Value, target: &Value, token: &Token) -> RResult<Value> {
    let Value::Type(code) = target else {
        return Err(RuntimeError::type_error("Type", token.clone()));
    };
    cast_to_code(value, *code, token)
}

/// Tries dispatching an `Object` source to its own `->{target_name}` method
/// (§4.6: "an Object source dispatches to a `->T` method") ahead of the
/// builtin coercion for that target. `None` means no such method exists, so
/// the caller should fall back to the builtin behavior.
fn object_coercion(value: &Value, target_name: &str, token: &Token) -> Option<RResult<Value>> {
    let Value::Object(scope) = value else { return None };
    let Some(Value::Function(f)) = scope.get_own(crate::intern::hash(&format!("->{target_name}"))) else {
        return None;
    };
    let mut ctx = crate::eval::RunCtx::new(scope.clone());
    Some(crate::eval::call_function(&f, vec![], &[], &mut ctx, token))
}

fn cast_to_code(value: &Value, code: TypeCode, token: &Token) -> RResult<Value> {
    match code {
        kind::KIND_NIL => Ok(Value::Nil),
        kind::KIND_ANY => Ok(value.clone()),
        kind::KIND_STRING => object_coercion(value, "String", token).unwrap_or_else(|| Ok(Value::string(stringify(value)))),
        kind::KIND_BOOLEAN => Ok(Value::Boolean(value.truthy())),
        kind::KIND_TYPE => Ok(Value::Type(value.augmented_kind())),
        kind::KIND_NUMBER => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::Boolean(b) => Ok(Value::Number(Number::Integer(i64::from(*b)))),
            Value::String(s) => parse_number(s, token),
            Value::Object(_) => object_coercion(value, "Number", token)
                .unwrap_or_else(|| Err(RuntimeError::malformed_coercion(value.kind_name(), "Number", token.clone()))),
            _ => Err(RuntimeError::malformed_coercion(value.kind_name(), "Number", token.clone())),
        },
        kind::KIND_ARRAY => match value {
            Value::Array(_) => Ok(value.clone()),
            Value::String(s) => Ok(Value::array(s.chars().map(|c| Value::string(c.to_string())).collect())),
            Value::Dictionary(d) => Ok(Value::array(
                d.borrow().iter().map(|(k, v)| Value::array(vec![Value::string(k.clone()), v.clone()])).collect(),
            )),
            Value::Object(_) => {
                object_coercion(value, "Array", token).unwrap_or_else(|| Ok(Value::array(vec![value.clone()])))
            }
            _ => Ok(Value::array(vec![value.clone()])),
        },
        kind::KIND_DICTIONARY => match value {
            Value::Dictionary(_) => Ok(value.clone()),
            Value::Array(a) => {
                let mut map = AHashMap::new();
                for entry in a.borrow().iter() {
                    let Value::Array(pair) = entry else {
                        return Err(RuntimeError::malformed_coercion("Array", "Dictionary", token.clone()));
                    };
                    let pair = pair.borrow();
                    if pair.len() != 2 {
                        return Err(RuntimeError::malformed_coercion("Array", "Dictionary", token.clone()));
                    }
                    map.insert(stringify(&pair[0]), pair[1].clone());
                }
                Ok(Value::dictionary(map))
            }
            Value::Object(_) => object_coercion(value, "Dictionary", token)
                .unwrap_or_else(|| Err(RuntimeError::malformed_coercion(value.kind_name(), "Dictionary", token.clone()))),
            _ => Err(RuntimeError::malformed_coercion(value.kind_name(), "Dictionary", token.clone())),
        },
        code if code >= 0 => match value {
            Value::Object(scope) if scope.extends(kind::code_to_name(code)) || scope.class_name() == kind::code_to_name(code) => {
                Ok(value.clone())
            }
            _ => Err(RuntimeError::malformed_coercion(
                value.kind_name(),
                &crate::intern::dehash(kind::code_to_name(code)),
                token.clone(),
            )),
        },
        _ => Err(RuntimeError::malformed_coercion(value.kind_name(), "?", token.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok() -> Token {
        Token::eof(std::rc::Rc::from("<test>"))
    }

    #[test]
    fn string_to_number_parses_integers_and_doubles() {
        assert!(matches!(parse_number("42", &tok()).unwrap(), Value::Number(Number::Integer(42))));
        assert!(matches!(parse_number("4.5", &tok()).unwrap(), Value::Number(Number::Double(_))));
    }

    #[test]
    fn string_to_number_parses_hex_and_binary_literals() {
        assert!(matches!(parse_number("0x1F", &tok()).unwrap(), Value::Number(Number::Integer(31))));
        assert!(matches!(parse_number("0b101", &tok()).unwrap(), Value::Number(Number::Integer(5))));
    }

    #[test]
    fn array_stringifies_with_source_syntax() {
        let v = Value::array(vec![Value::Number(Number::Integer(1)), Value::Number(Number::Integer(2))]);
        assert_eq!(stringify(&v), "[1, 2]");
    }

    #[test]
    fn boolean_to_number_cast() {
        let v = cast_to_code(&Value::Boolean(true), kind::KIND_NUMBER, &tok()).unwrap();
        assert!(matches!(v, Value::Number(Number::Integer(1))));
    }
}
