//! The dual-representation numeric kernel (§3.1, §4.1).
//!
//! A [`Number`] is either a 64-bit signed integer or a 64-bit double. Every
//! arithmetic operation re-normalizes its result: a double that is exactly
//! representable as its own integer truncation is retagged as an integer.
//! This keeps `1 + 1` an integer forever, while `1 / 3` stays a double.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};

/// Either branch of the dual representation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Number {
    Integer(i64),
    Double(f64),
}

impl Number {
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Double(d) => d,
        }
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, Number::Integer(_))
    }

    /// Re-normalizes a double into an integer when the truncation is exact.
    ///
    /// This is the invariant from §4.1: after every arithmetic op, a double
    /// that equals its own integer cast is retagged.
    #[must_use]
    fn normalize(d: f64) -> Number {
        if d.is_finite() && d == (d as i64 as f64) {
            Number::Integer(d as i64)
        } else {
            Number::Double(d)
        }
    }

    #[must_use]
    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => match a.checked_add(b) {
                Some(sum) => Number::Integer(sum),
                None => Number::normalize(a as f64 + b as f64),
            },
            _ => Number::normalize(self.as_f64() + other.as_f64()),
        }
    }

    #[must_use]
    pub fn sub(self, other: Number) -> Number {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => match a.checked_sub(b) {
                Some(diff) => Number::Integer(diff),
                None => Number::normalize(a as f64 - b as f64),
            },
            _ => Number::normalize(self.as_f64() - other.as_f64()),
        }
    }

    #[must_use]
    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => match a.checked_mul(b) {
                Some(prod) => Number::Integer(prod),
                // Integer overflow on `*` falls back to double without trapping (§8.3).
                None => Number::normalize(a as f64 * b as f64),
            },
            _ => Number::normalize(self.as_f64() * other.as_f64()),
        }
    }

    /// Division by zero yields `+inf` (double); integer÷integer yields an
    /// integer only when the division is exact (§3.1, §4.1).
    #[must_use]
    pub fn div(self, other: Number) -> Number {
        if let (Number::Integer(a), Number::Integer(b)) = (self, other) {
            if b == 0 {
                return Number::Double(f64::INFINITY);
            }
            if a % b == 0 {
                return Number::Integer(a / b);
            }
            return Number::normalize(a as f64 / b as f64);
        }
        if other.as_f64() == 0.0 {
            return Number::Double(f64::INFINITY);
        }
        Number::normalize(self.as_f64() / other.as_f64())
    }

    #[must_use]
    pub fn rem(self, other: Number) -> Number {
        if let (Number::Integer(a), Number::Integer(b)) = (self, other) {
            if b == 0 {
                return Number::Double(f64::NAN);
            }
            return Number::Integer(a % b);
        }
        Number::normalize(self.as_f64() % other.as_f64())
    }

    #[must_use]
    pub fn pow(self, other: Number) -> Number {
        if let (Number::Integer(a), Number::Integer(b)) = (self, other) {
            if b >= 0 && b <= u32::MAX as i64 {
                if let Some(p) = checked_ipow(a, b as u32) {
                    return Number::Integer(p);
                }
            }
        }
        Number::normalize(self.as_f64().powf(other.as_f64()))
    }

    fn as_i64(self) -> i64 {
        match self {
            Number::Integer(i) => i,
            Number::Double(d) => d as i64,
        }
    }

    #[must_use]
    pub fn bitand(self, other: Number) -> Number {
        Number::Integer(self.as_i64() & other.as_i64())
    }

    #[must_use]
    pub fn bitor(self, other: Number) -> Number {
        Number::Integer(self.as_i64() | other.as_i64())
    }

    #[must_use]
    pub fn bitxor(self, other: Number) -> Number {
        Number::Integer(self.as_i64() ^ other.as_i64())
    }

    #[must_use]
    pub fn shl(self, other: Number) -> Number {
        Number::Integer(self.as_i64().wrapping_shl(other.as_i64() as u32))
    }

    #[must_use]
    pub fn shr(self, other: Number) -> Number {
        Number::Integer(self.as_i64().wrapping_shr(other.as_i64() as u32))
    }

    #[must_use]
    pub fn bitnot(self) -> Number {
        Number::Integer(!self.as_i64())
    }

    #[must_use]
    pub fn neg(self) -> Number {
        match self {
            Number::Integer(i) => Number::Integer(-i),
            Number::Double(d) => Number::Double(-d),
        }
    }

    /// Comparison is numeric, not tag-aware (§3.1).
    #[must_use]
    pub fn partial_cmp_numeric(self, other: Number) -> Option<Ordering> {
        self.as_f64().partial_cmp(&other.as_f64())
    }

    /// Equality *does* require same tag when compared as a [`Value`](crate::value::Value),
    /// but bare numeric equality between two `Number`s is value-wise.
    #[must_use]
    pub fn eq_numeric(self, other: Number) -> bool {
        self.as_f64() == other.as_f64()
    }

    /// Formats a double using maximum precision, then strips trailing
    /// zeros and a trailing decimal point (§4.1).
    fn format_double(d: f64) -> String {
        if d.is_nan() {
            return "nan".to_string();
        }
        if d.is_infinite() {
            return if d > 0.0 { "inf".to_string() } else { "-inf".to_string() };
        }
        let mut s = format!("{d:.17}");
        if s.contains('.') {
            while s.ends_with('0') {
                s.pop();
            }
            if s.ends_with('.') {
                s.pop();
            }
        }
        s
    }
}

fn checked_ipow(mut base: i64, mut exp: u32) -> Option<i64> {
    let mut acc: i64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.checked_mul(base)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = base.checked_mul(base)?;
        }
    }
    Some(acc)
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{i}"),
            Number::Double(d) => write!(f, "{}", Number::format_double(*d)),
        }
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number::Integer(i)
    }
}

impl From<f64> for Number {
    fn from(d: f64) -> Self {
        Number::normalize(d)
    }
}

// Operator trait impls delegate to the explicit methods above so call sites
// in the evaluator can use either spelling.
impl Add for Number {
    type Output = Number;
    fn add(self, rhs: Number) -> Number {
        Number::add(self, rhs)
    }
}
impl Sub for Number {
    type Output = Number;
    fn sub(self, rhs: Number) -> Number {
        Number::sub(self, rhs)
    }
}
impl Mul for Number {
    type Output = Number;
    fn mul(self, rhs: Number) -> Number {
        Number::mul(self, rhs)
    }
}
impl Div for Number {
    type Output = Number;
    fn div(self, rhs: Number) -> Number {
        Number::div(self, rhs)
    }
}
impl Rem for Number {
    type Output = Number;
    fn rem(self, rhs: Number) -> Number {
        Number::rem(self, rhs)
    }
}
impl BitAnd for Number {
    type Output = Number;
    fn bitand(self, rhs: Number) -> Number {
        Number::bitand(self, rhs)
    }
}
impl BitOr for Number {
    type Output = Number;
    fn bitor(self, rhs: Number) -> Number {
        Number::bitor(self, rhs)
    }
}
impl BitXor for Number {
    type Output = Number;
    fn bitxor(self, rhs: Number) -> Number {
        Number::bitxor(self, rhs)
    }
}
impl Shl for Number {
    type Output = Number;
    fn shl(self, rhs: Number) -> Number {
        Number::shl(self, rhs)
    }
}
impl Shr for Number {
    type Output = Number;
    fn shr(self, rhs: Number) -> Number {
        Number::shr(self, rhs)
    }
}
impl Not for Number {
    type Output = Number;
    fn not(self) -> Number {
        Number::bitnot(self)
    }
}
impl Neg for Number {
    type Output = Number;
    fn neg(self) -> Number {
        Number::neg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_after_add_sub() {
        // Invariant 1 (§8.1): n + 0.0 and n - 0.0 keep the integer tag iff n is integer-valued.
        let n = Number::Integer(5);
        assert!(n.add(Number::Double(0.0)).is_integer());
        assert!(n.sub(Number::Double(0.0)).is_integer());
        let d = Number::Double(5.5);
        assert!(!d.add(Number::Double(0.0)).is_integer());
    }

    #[test]
    fn integer_division_exact_vs_inexact() {
        assert_eq!(Number::Integer(6).div(Number::Integer(3)), Number::Integer(2));
        assert!(!Number::Integer(1).div(Number::Integer(3)).is_integer());
    }

    #[test]
    fn division_by_zero_is_positive_infinity() {
        let r = Number::Integer(1).div(Number::Integer(0));
        assert_eq!(r, Number::Double(f64::INFINITY));
    }

    #[test]
    fn division_by_zero_is_positive_infinity_even_for_a_negative_dividend() {
        let r = Number::Integer(-5).div(Number::Integer(0));
        assert_eq!(r, Number::Double(f64::INFINITY));
        let r = Number::Double(-5.0).div(Number::Double(0.0));
        assert_eq!(r, Number::Double(f64::INFINITY));
    }

    #[test]
    fn inf_minus_inf_is_nan() {
        let inf = Number::Double(f64::INFINITY);
        let r = inf.sub(inf);
        match r {
            Number::Double(d) => assert!(d.is_nan()),
            Number::Integer(_) => panic!("expected double"),
        }
    }

    #[test]
    fn overflow_on_mul_falls_back_to_double() {
        let r = Number::Integer(i64::MAX).mul(Number::Integer(2));
        assert!(!r.is_integer());
    }

    #[test]
    fn double_formatting_strips_trailing_zeros() {
        assert_eq!(Number::Double(2.5).to_string(), "2.5");
        assert_eq!(Number::Integer(7).to_string(), "7");
    }
}
