use regex::Regex;

/// A boolean value, or the null marker for a bool-typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bool(Option<bool>);

impl Bool {
    pub fn new(b: bool) -> Self {
        Self(Some(b))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn value(&self) -> Option<bool> {
        self.0
    }

    /// Matches the original's asymmetric definition: `a` is "larger" than
    /// `b` whenever `a` is `true` and neither side is null, regardless of
    /// `b`'s value.
    pub fn larger(&self, other: &Bool) -> bool {
        self.0 == Some(true) && other.0.is_some()
    }

    /// Mirrors [`Self::larger`]: `a` is "smaller" than `b` whenever `a` is
    /// `false` and neither side is null.
    pub fn smaller(&self, other: &Bool) -> bool {
        self.0 == Some(false) && other.0.is_some()
    }

    pub fn equal(&self, other: &Bool) -> bool {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a == b,
            (None, None) => true,
            _ => false,
        }
    }

    pub fn not(&self, other: &Bool) -> bool {
        !self.equal(other)
    }

    pub fn between(&self, lo: &Bool, hi: &Bool) -> bool {
        self.larger(lo) && self.smaller(hi)
    }

    pub fn matches(&self, re: &Regex) -> bool {
        re.is_match(&self.to_canonical_string())
    }

    pub fn to_canonical_string(&self) -> String {
        match self.0 {
            Some(true) => "true".to_string(),
            Some(false) => "false".to_string(),
            None => "null".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equals_null() {
        assert!(Bool::null().equal(&Bool::null()));
    }

    #[test]
    fn true_is_larger_than_false() {
        assert!(Bool::new(true).larger(&Bool::new(false)));
        assert!(!Bool::new(false).larger(&Bool::new(true)));
    }

    #[test]
    fn nulls_never_order() {
        assert!(!Bool::null().larger(&Bool::new(false)));
        assert!(!Bool::new(true).smaller(&Bool::null()));
    }
}
