//! Type codes for the `@` type-of operator and for [`crate::signature::ParamType`]
//! bases (§3.2, §9).
//!
//! Builtin kinds get fixed negative codes; a positive code is the interned
//! hash of a class name (§9: "`base: i32 (Any=-11, Nil=-1, Number=-2, …,
//! positive = class hash)`").

use crate::intern::NameId;

pub type TypeCode = i64;

pub const KIND_NIL: TypeCode = -1;
pub const KIND_NUMBER: TypeCode = -2;
pub const KIND_BOOLEAN: TypeCode = -3;
pub const KIND_STRING: TypeCode = -4;
pub const KIND_ARRAY: TypeCode = -5;
pub const KIND_DICTIONARY: TypeCode = -6;
pub const KIND_FUNCTION: TypeCode = -7;
pub const KIND_OBJECT: TypeCode = -8;
pub const KIND_TYPE: TypeCode = -9;
pub const KIND_POINTER: TypeCode = -10;
pub const KIND_ANY: TypeCode = -11;

/// A class's hashed name, reinterpreted as a positive type code.
#[must_use]
pub fn class_code(name: NameId) -> TypeCode {
    name.index() as i64
}

/// Inverse of [`class_code`] for a code already known to be positive.
#[must_use]
pub fn code_to_name(code: TypeCode) -> NameId {
    debug_assert!(code >= 0, "code_to_name called with a builtin (negative) code");
    NameId::from_index(code as usize)
}

/// Human-readable kind name for a builtin code, used in error messages and
/// by the `->String` coercion of a `Type` value (§4.6).
#[must_use]
pub fn builtin_name(code: TypeCode) -> Option<&'static str> {
    Some(match code {
        KIND_NIL => "Nil",
        KIND_NUMBER => "Number",
        KIND_BOOLEAN => "Boolean",
        KIND_STRING => "String",
        KIND_ARRAY => "Array",
        KIND_DICTIONARY => "Dictionary",
        KIND_FUNCTION => "Function",
        KIND_OBJECT => "Object",
        KIND_TYPE => "Type",
        KIND_POINTER => "Pointer",
        KIND_ANY => "Any",
        _ => return None,
    })
}
