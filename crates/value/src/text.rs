use regex::Regex;

/// A text value, or the null marker for a text-typed field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Text(Option<String>);

impl Text {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Some(s.into()))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn larger(&self, other: &Text) -> bool {
        matches!((&self.0, &other.0), (Some(a), Some(b)) if a > b)
    }

    pub fn smaller(&self, other: &Text) -> bool {
        matches!((&self.0, &other.0), (Some(a), Some(b)) if a < b)
    }

    pub fn equal(&self, other: &Text) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => a == b,
            (None, None) => true,
            _ => false,
        }
    }

    pub fn not(&self, other: &Text) -> bool {
        !self.equal(other)
    }

    pub fn between(&self, lo: &Text, hi: &Text) -> bool {
        self.larger(lo) && self.smaller(hi)
    }

    pub fn matches(&self, re: &Regex) -> bool {
        re.is_match(&self.to_canonical_string())
    }

    pub fn to_canonical_string(&self) -> String {
        match &self.0 {
            Some(s) => s.clone(),
            None => "null".to_string(),
        }
    }
}
