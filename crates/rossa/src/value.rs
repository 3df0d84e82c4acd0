//! The tagged value variant (§3.2) — the eleven value kinds of Rossa.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::function::FunctionValue;
use crate::kind::{self, TypeCode};
use crate::number::Number;
use crate::scope::ScopeRef;

pub type ArrayData = Rc<RefCell<Vec<Value>>>;
pub type DictData = Rc<RefCell<AHashMap<String, Value>>>;

/// Opaque host handle, only ever produced by an extension callback (§3.2,
/// §6.2). The payload is host-defined; the core never inspects it.
#[derive(Clone)]
pub struct PointerData(pub Rc<dyn std::any::Any>);

impl fmt::Debug for PointerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer(@{:p})", Rc::as_ptr(&self.0))
    }
}

/// The tagged variant over the 11 value kinds of §3.2. `Any` is
/// deliberately absent: it is only ever a [`crate::signature::ParamType`]
/// wildcard, never a runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Number(Number),
    Boolean(bool),
    /// UTF-8 text. Immutable in place, so sharing the backing buffer via
    /// `Rc<str>` is observationally identical to the "always copy by
    /// value" rule of §3.2 — there is no operator that mutates a String
    /// through an existing handle.
    String(Rc<str>),
    Array(ArrayData),
    Dictionary(DictData),
    Function(FunctionValue),
    Object(ScopeRef),
    Type(TypeCode),
    Pointer(PointerData),
}

impl Value {
    #[must_use]
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn dictionary(map: AHashMap<String, Value>) -> Self {
        Value::Dictionary(Rc::new(RefCell::new(map)))
    }

    /// The augmented kind (§9 glossary): the builtin code, except for
    /// Objects, which report their class's hashed name instead of the
    /// generic Object code.
    #[must_use]
    pub fn augmented_kind(&self) -> TypeCode {
        match self {
            Value::Nil => kind::KIND_NIL,
            Value::Number(_) => kind::KIND_NUMBER,
            Value::Boolean(_) => kind::KIND_BOOLEAN,
            Value::String(_) => kind::KIND_STRING,
            Value::Array(_) => kind::KIND_ARRAY,
            Value::Dictionary(_) => kind::KIND_DICTIONARY,
            Value::Function(_) => kind::KIND_FUNCTION,
            Value::Object(scope) => kind::class_code(scope.class_name()),
            Value::Type(_) => kind::KIND_TYPE,
            Value::Pointer(_) => kind::KIND_POINTER,
        }
    }

    /// The plain (non-augmented) builtin kind code, used by error
    /// messages and by coercion's kind dispatch.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Object(_) => "Object",
            other => kind::builtin_name(match other {
                Value::Nil => kind::KIND_NIL,
                Value::Number(_) => kind::KIND_NUMBER,
                Value::Boolean(_) => kind::KIND_BOOLEAN,
                Value::String(_) => kind::KIND_STRING,
                Value::Array(_) => kind::KIND_ARRAY,
                Value::Dictionary(_) => kind::KIND_DICTIONARY,
                Value::Function(_) => kind::KIND_FUNCTION,
                Value::Type(_) => kind::KIND_TYPE,
                Value::Pointer(_) => kind::KIND_POINTER,
                Value::Object(_) => unreachable!(),
            })
            .unwrap_or("?"),
        }
    }

    /// Deep copy for Array/Dictionary (§3.2): nested Arrays/Dictionaries
    /// are cloned recursively; Function/Object/Pointer payloads inside
    /// them stay reference-shared, since those kinds are always
    /// reference-shared regardless of container copy semantics.
    #[must_use]
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(data) => {
                let cloned: Vec<Value> = data.borrow().iter().map(Value::deep_clone).collect();
                Value::array(cloned)
            }
            Value::Dictionary(data) => {
                let cloned: AHashMap<String, Value> =
                    data.borrow().iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect();
                Value::dictionary(cloned)
            }
            other => other.clone(),
        }
    }

    /// Structural value equality (§3.2): deep for Array/Dictionary,
    /// tag-aware for Number, identity for Function/Pointer/Object (there
    /// is no other sensible notion of equality for those kinds).
    #[must_use]
    pub fn value_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.value_eq(y))
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                let live_a: AHashMap<&String, &Value> =
                    a.iter().filter(|(_, v)| !matches!(v, Value::Nil)).collect();
                let live_b: AHashMap<&String, &Value> =
                    b.iter().filter(|(_, v)| !matches!(v, Value::Nil)).collect();
                live_a.len() == live_b.len()
                    && live_a.iter().all(|(k, v)| live_b.get(*k).is_some_and(|bv| bv.value_eq(v)))
            }
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Pointer(a), Value::Pointer(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }

    /// Pure (physical) equality, `===` (§3.2): for Object, scope
    /// identity; for every other kind, same as [`Value::value_eq`].
    #[must_use]
    pub fn pure_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => self.value_eq(other),
        }
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => n.as_f64() != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            Value::Dictionary(d) => !d.borrow().is_empty(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_clone_makes_independent_array() {
        let a = Value::array(vec![Value::Number(Number::Integer(1))]);
        let b = a.deep_clone();
        if let (Value::Array(ad), Value::Array(bd)) = (&a, &b) {
            bd.borrow_mut()[0] = Value::Number(Number::Integer(99));
            assert_eq!(ad.borrow()[0].value_eq(&Value::Number(Number::Integer(1))), true);
        } else {
            unreachable!()
        }
    }

    #[test]
    fn nil_valued_dict_entries_are_pruned_for_equality() {
        let mut m1 = AHashMap::new();
        m1.insert("a".to_string(), Value::Number(Number::Integer(1)));
        m1.insert("b".to_string(), Value::Nil);
        let mut m2 = AHashMap::new();
        m2.insert("a".to_string(), Value::Number(Number::Integer(1)));
        assert!(Value::dictionary(m1).value_eq(&Value::dictionary(m2)));
    }

    #[test]
    fn number_equality_is_tag_aware() {
        assert!(!Value::Number(Number::Integer(1)).value_eq(&Value::Number(Number::Double(1.0))));
    }
}
