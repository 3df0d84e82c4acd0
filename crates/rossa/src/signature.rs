//! Structural type descriptors used by function parameters, and the
//! specificity scoring that drives overload resolution (§3.5, §9 design
//! notes).

use crate::kind::{self, TypeCode};
use crate::value::Value;

/// A structural type descriptor: a base kind plus nested qualifiers used
/// to further specify `Function` parameters, e.g.
/// `Function<Number, Function<Any>>` (§3.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamType {
    pub base: TypeCode,
    pub qualifiers: Vec<ParamType>,
}

impl ParamType {
    #[must_use]
    pub fn any() -> Self {
        ParamType { base: kind::KIND_ANY, qualifiers: Vec::new() }
    }

    #[must_use]
    pub fn builtin(code: TypeCode) -> Self {
        ParamType { base: code, qualifiers: Vec::new() }
    }

    #[must_use]
    pub fn class(code: TypeCode) -> Self {
        ParamType { base: code, qualifiers: Vec::new() }
    }

    /// Specificity score between this ParamType and a concrete value
    /// (§3.5):
    /// - exact kind match: 3
    /// - `self` is a class name and `value` is an Object extending it: 2
    /// - `self` is `Any`: 1
    /// - otherwise: 0 (no match)
    #[must_use]
    pub fn score(&self, value: &Value) -> u8 {
        if self.base == kind::KIND_ANY {
            return 1;
        }
        let augmented = value.augmented_kind();
        if self.base == augmented {
            return 3;
        }
        if self.base >= 0 {
            if let Value::Object(scope) = value {
                if scope.extends(kind::code_to_name(self.base)) {
                    return 2;
                }
            }
        }
        0
    }
}

/// An ordered list of parameter types (§3.5).
pub type Signature = Vec<ParamType>;

/// Scores a whole signature against a call's argument list: the *minimum*
/// per-argument score, or 0 if any argument fails to match (§3.5).
#[must_use]
pub fn score_signature(sig: &Signature, args: &[Value]) -> u8 {
    if sig.len() != args.len() {
        return 0;
    }
    let mut min = u8::MAX;
    for (p, a) in sig.iter().zip(args.iter()) {
        let s = p.score(a);
        if s == 0 {
            return 0;
        }
        min = min.min(s);
    }
    if sig.is_empty() { 1 } else { min }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;

    #[test]
    fn exact_kind_scores_three() {
        let p = ParamType::builtin(kind::KIND_NUMBER);
        assert_eq!(p.score(&Value::Number(Number::Integer(1))), 3);
    }

    #[test]
    fn any_scores_one() {
        let p = ParamType::any();
        assert_eq!(p.score(&Value::Boolean(true)), 1);
    }

    #[test]
    fn mismatched_kind_scores_zero() {
        let p = ParamType::builtin(kind::KIND_NUMBER);
        assert_eq!(p.score(&Value::Boolean(true)), 0);
    }

    #[test]
    fn signature_score_is_the_minimum() {
        let sig = vec![ParamType::builtin(kind::KIND_NUMBER), ParamType::any()];
        let args = vec![Value::Number(Number::Integer(1)), Value::Boolean(true)];
        assert_eq!(score_signature(&sig, &args), 1);
    }
}
