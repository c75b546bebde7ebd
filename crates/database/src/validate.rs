//! Name validation shared by database and table creation: a database or
//! table name must match `^[a-zA-Z0-9_-]+$` before any directory is
//! touched.

use regex::Regex;

pub fn validate_name(name: &str) -> anyhow::Result<()> {
    let pattern = Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static pattern is valid regex");
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(errors::name_does_not_match_allowed_pattern(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_underscore_and_dash() {
        assert!(validate_name("users_2-final").is_ok());
    }

    #[test]
    fn rejects_path_separators_and_whitespace() {
        for bad in ["../etc", "users table", "a/b", ""] {
            let err = validate_name(bad).unwrap_err();
            assert_eq!(errors::metadata(&err).unwrap().short_msg, "NameDoesNotMatchAllowedPattern");
        }
    }
}
