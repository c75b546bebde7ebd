use serde::{
    Deserialize,
    Serialize,
};

/// The six predicate operators a `where` clause can use, matching the
/// wire-level tokens the external request model carries verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    Not,
    #[serde(rename = "match")]
    Match,
    #[serde(rename = ">")]
    Larger,
    #[serde(rename = "<")]
    Smaller,
    #[serde(rename = "><")]
    Between,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Operator::Equals),
            "!=" => Some(Operator::Not),
            "match" => Some(Operator::Match),
            ">" => Some(Operator::Larger),
            "<" => Some(Operator::Smaller),
            "><" => Some(Operator::Between),
            _ => None,
        }
    }
}
