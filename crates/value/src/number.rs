use regex::Regex;

/// A numeric value, or the null marker for a number-typed field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Number(Option<f64>);

impl Number {
    pub fn new(n: f64) -> Self {
        Self(Some(n))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn larger(&self, other: &Number) -> bool {
        matches!((self.0, other.0), (Some(a), Some(b)) if a > b)
    }

    pub fn smaller(&self, other: &Number) -> bool {
        matches!((self.0, other.0), (Some(a), Some(b)) if a < b)
    }

    pub fn equal(&self, other: &Number) -> bool {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a == b,
            (None, None) => true,
            _ => false,
        }
    }

    pub fn not(&self, other: &Number) -> bool {
        !self.equal(other)
    }

    pub fn between(&self, lo: &Number, hi: &Number) -> bool {
        self.larger(lo) && self.smaller(hi)
    }

    pub fn matches(&self, re: &Regex) -> bool {
        re.is_match(&self.to_canonical_string())
    }

    pub fn to_canonical_string(&self) -> String {
        match self.0 {
            Some(n) => format_number(n),
            None => "null".to_string(),
        }
    }
}

/// Shortest round-trippable decimal form, matching `strconv.ParseFloat`'s
/// canonical rendering closely enough that the same text that parses back
/// into this number is what gets hashed for the exact index.
fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let mut s = format!("{n}");
        if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN") {
            s.push_str(".0");
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equals_null() {
        assert!(Number::null().equal(&Number::null()));
    }

    #[test]
    fn ordering_ignores_nulls() {
        let a = Number::null();
        let b = Number::new(1.0);
        assert!(!a.larger(&b));
        assert!(!a.smaller(&b));
    }

    #[test]
    fn between_is_exclusive() {
        let v = Number::new(5.0);
        assert!(v.between(&Number::new(1.0), &Number::new(10.0)));
        assert!(!Number::new(1.0).between(&Number::new(1.0), &Number::new(10.0)));
    }

    #[test]
    fn integral_values_render_without_trailing_zero() {
        assert_eq!(Number::new(42.0).to_canonical_string(), "42");
        assert_eq!(Number::new(0.5).to_canonical_string(), "0.5");
    }
}
