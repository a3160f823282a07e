use std::cmp::Ordering;
use std::fmt;

use num::{BigInt, ToPrimitive};

/// A Scheme number: an exact integer of any size, or an inexact real.
/// Exact operands give exact results; one inexact operand makes the
/// result inexact.
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Exact(BigInt),
    Inexact(f64),
}

impl Number {
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Exact(n) => n.to_f64().unwrap_or(f64::NAN),
            Number::Inexact(x) => *x,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Number::Exact(_))
    }

    pub fn add(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a + b),
            _ => Number::Inexact(self.to_f64() + other.to_f64()),
        }
    }

    pub fn sub(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a - b),
            _ => Number::Inexact(self.to_f64() - other.to_f64()),
        }
    }

    pub fn mul(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a * b),
            _ => Number::Inexact(self.to_f64() * other.to_f64()),
        }
    }

    /// Numeric comparison. `None` when either side is NaN.
    pub fn compare(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => Some(a.cmp(b)),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

/// Try to parse a token as a number: exact integer first, then inexact.
/// Only tokens that look numeric are considered, so `inf`, `nan` and
/// `1_000` stay symbols.
pub fn parse(token: &str) -> Option<Number> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.is_empty() {
        return None;
    }
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse::<BigInt>().ok().map(Number::Exact);
    }
    let looks_real = digits.bytes().any(|b| b.is_ascii_digit())
        && digits
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if looks_real {
        return token.parse::<f64>().ok().map(Number::Inexact);
    }
    None
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Exact(n) => write!(f, "{}", n),
            Number::Inexact(x) => {
                let s = x.to_string();
                // An inexact integer must not print like an exact one.
                if x.is_finite() && !s.contains(['.', 'e', 'E']) {
                    write!(f, "{}.0", s)
                } else {
                    write!(f, "{}", s)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(n: i64) -> Number {
        Number::Exact(BigInt::from(n))
    }

    #[test]
    fn parses_exact_before_inexact() {
        assert_eq!(parse("42"), Some(exact(42)));
        assert_eq!(parse("-7"), Some(exact(-7)));
        assert_eq!(parse("+3"), Some(exact(3)));
        assert_eq!(parse("2.5"), Some(Number::Inexact(2.5)));
        assert_eq!(parse("1e3"), Some(Number::Inexact(1000.0)));
        assert_eq!(parse(".5"), Some(Number::Inexact(0.5)));
    }

    #[test]
    fn non_numbers_are_rejected() {
        for token in ["+", "-", "...", "inf", "nan", "abc", "1_000", "1+x", ""] {
            assert_eq!(parse(token), None, "token {:?}", token);
        }
    }

    #[test]
    fn exact_integers_are_unbounded() {
        let big = parse("123456789012345678901234567890").unwrap();
        let sum = big.add(&exact(10));
        assert_eq!(sum.to_string(), "123456789012345678901234567900");
        assert!(sum.is_exact());
    }

    #[test]
    fn inexact_contaminates() {
        let r = exact(1).add(&Number::Inexact(0.5));
        assert_eq!(r, Number::Inexact(1.5));
        let r = exact(2).mul(&Number::Inexact(2.0));
        assert!(!r.is_exact());
        assert_eq!(r.to_string(), "4.0");
    }

    #[test]
    fn inexact_integers_keep_a_fraction_marker() {
        assert_eq!(Number::Inexact(3.0).to_string(), "3.0");
        assert_eq!(Number::Inexact(-0.25).to_string(), "-0.25");
        assert_eq!(exact(3).to_string(), "3");
    }

    #[test]
    fn mixed_comparison() {
        assert_eq!(exact(1).compare(&Number::Inexact(1.0)), Some(Ordering::Equal));
        assert_eq!(exact(1).compare(&exact(2)), Some(Ordering::Less));
        assert_eq!(Number::Inexact(f64::NAN).compare(&exact(0)), None);
    }
}
