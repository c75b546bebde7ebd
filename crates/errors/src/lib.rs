//! Error classification shared across every InfiniteDB crate.
//!
//! Every error the engine surfaces to a caller is an [`anyhow::Error`] with
//! an [`ErrorMetadata`] attached via `.context(...)`. Internal code matches
//! on [`ErrorCode`] rather than inspecting message text; a transport layer
//! translating to an HTTP-style status downcasts the chain to
//! `&ErrorMetadata`.

use std::fmt;

use anyhow::Context;

/// Coarse classification of an engine error, matching the behavior groups in
/// the spec: validation and not-found and conflict errors never change
/// state; `Overloaded` means the caller may retry; `Internal` covers IO and
/// otherwise-fatal conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    Overloaded,
    Internal,
}

/// Attached to an [`anyhow::Error`] chain to classify it without string
/// matching. `short_msg` is a stable, ScreamingCamelCase tag usable in tests
/// and metrics; `msg` is the human-readable, developer-facing message.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{msg}")]
pub struct ErrorMetadata {
    pub code: ErrorCode,
    pub short_msg: String,
    pub msg: String,
}

impl ErrorMetadata {
    pub fn new(code: ErrorCode, short_msg: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            code,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    pub fn validation(short_msg: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, short_msg, msg)
    }

    pub fn not_found(short_msg: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, short_msg, msg)
    }

    pub fn conflict(short_msg: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, short_msg, msg)
    }

    pub fn overloaded(short_msg: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Overloaded, short_msg, msg)
    }

    pub fn internal(short_msg: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, short_msg, msg)
    }

    /// The HTTP-style status a transport layer should map this to. The
    /// engine itself never produces HTTP responses; this is the contract
    /// that collaborator depends on.
    pub fn status_code(&self) -> u16 {
        match self.code {
            ErrorCode::Validation => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::Overloaded => 503,
            ErrorCode::Internal => 500,
        }
    }
}

/// Find the [`ErrorMetadata`] attached to an anyhow chain, if any.
pub fn metadata(err: &anyhow::Error) -> Option<&ErrorMetadata> {
    err.chain().find_map(|cause| cause.downcast_ref())
}

fn err(code: ErrorCode, short_msg: &'static str, msg: impl fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("{msg}").context(ErrorMetadata::new(code, short_msg, msg.to_string()))
}

// --- validation ---------------------------------------------------------

pub fn not_a_valid_operator() -> anyhow::Error {
    err(ErrorCode::Validation, "NotAValidOperator", "not a valid operator")
}

pub fn not_enough_values_for_operator(operator: &str) -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "NotEnoughValuesForOperator",
        format!("not enough values for operator {operator}"),
    )
}

pub fn value_is_not_text() -> anyhow::Error {
    err(ErrorCode::Validation, "ValueIsNotText", "value is not text")
}

pub fn value_is_not_number() -> anyhow::Error {
    err(ErrorCode::Validation, "ValueIsNotNumber", "value is not number")
}

pub fn value_is_not_bool() -> anyhow::Error {
    err(ErrorCode::Validation, "ValueIsNotBool", "value is not bool")
}

pub fn type_parse_error(raw: &str, type_name: &str) -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "TypeParseError",
        format!("could not parse \"{raw}\" as {type_name}"),
    )
}

pub fn field_cannot_be_unique_without_being_indexed() -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "FieldCannotBeUniqueWithoutBeingIndexed",
        "field cannot be unique without being indexed",
    )
}

pub fn only_value_all_or_any() -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "OnlyValueAllOrAny",
        "can only have value, all or any, not in combination",
    )
}

pub fn cannot_have_and_and_or_in_one_query() -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "CannotHaveAndANDOrInOneQuery",
        "cannot have AND and OR in one query",
    )
}

pub fn type_not_supported(type_name: &str) -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "TypeNotSupported",
        format!("type {type_name} not supported"),
    )
}

pub fn is_not_a_string(param: &str) -> anyhow::Error {
    err(ErrorCode::Validation, "IsNotAString", format!("{param} is not a string"))
}

pub fn is_not_a_number(param: &str) -> anyhow::Error {
    err(ErrorCode::Validation, "IsNotANumber", format!("{param} is not a number"))
}

pub fn is_not_a_map(param: &str) -> anyhow::Error {
    err(ErrorCode::Validation, "IsNotAMap", format!("{param} is not a map"))
}

pub fn name_does_not_match_allowed_pattern(name: &str) -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "NameDoesNotMatchAllowedPattern",
        format!("the name \"{name}\" does not match the allowed pattern"),
    )
}

pub fn not_a_valid_function() -> anyhow::Error {
    err(ErrorCode::Validation, "NotAValidFunction", "not a valid function")
}

pub fn field_has_unsupported_type_for_this_function(field_name: &str) -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "FieldHasUnsupportedTypeForThisFunction",
        format!("the field \"{field_name}\" has an unsupported type for this function"),
    )
}

pub fn could_not_parse_formula() -> anyhow::Error {
    err(ErrorCode::Validation, "CouldNotParseFormula", "could not parse formula")
}

pub fn cannot_divide_by_zero() -> anyhow::Error {
    err(ErrorCode::Validation, "CannotDivideByZero", "cannot divide by zero")
}

pub fn cannot_sort_type() -> anyhow::Error {
    err(ErrorCode::Validation, "CannotSortType", "cannot sort this type")
}

pub fn invalid_regex(pattern: &str) -> anyhow::Error {
    err(
        ErrorCode::Validation,
        "InvalidRegex",
        format!("\"{pattern}\" is not a valid regex"),
    )
}

// --- not found -----------------------------------------------------------

pub fn database_does_not_exist() -> anyhow::Error {
    err(ErrorCode::NotFound, "DatabaseDoesNotExist", "database does not exist")
}

pub fn table_does_not_exist() -> anyhow::Error {
    err(ErrorCode::NotFound, "TableDoesNotExist", "table does not exist")
}

pub fn cannot_find_field(field_name: &str) -> anyhow::Error {
    err(
        ErrorCode::NotFound,
        "CannotFindField",
        format!("cannot find field \"{field_name}\" in table"),
    )
}

pub fn could_not_find_object_with_at_least_one_indexed_and_unique_value() -> anyhow::Error {
    err(
        ErrorCode::NotFound,
        "CouldNotFindObjectWithAtLeastOneIndexedAndUniqueValue",
        "could not find object with at least one indexed and unique value",
    )
}

// --- conflict --------------------------------------------------------------

pub fn database_already_exists() -> anyhow::Error {
    err(ErrorCode::Conflict, "DatabaseAlreadyExists", "database already exists")
}

pub fn table_already_exists() -> anyhow::Error {
    err(ErrorCode::Conflict, "TableAlreadyExists", "table already exists")
}

pub fn found_existing_object_with_field(field_name: &str) -> anyhow::Error {
    err(
        ErrorCode::Conflict,
        "FoundExistingObjectWithField",
        format!("found existing object with field {field_name}"),
    )
}

pub fn found_existing_object_with_combined_uniques() -> anyhow::Error {
    err(
        ErrorCode::Conflict,
        "FoundExistingObjectWithCombinedUniques",
        "found existing object with combined uniques",
    )
}

pub fn object_does_not_have_value_for_field(field_name: &str) -> anyhow::Error {
    err(
        ErrorCode::Conflict,
        "ObjectDoesNotHaveValueForField",
        format!("object does not have value for field {field_name} and field cannot be null"),
    )
}

// --- readiness -------------------------------------------------------------

pub fn idb_not_ready() -> anyhow::Error {
    err(ErrorCode::Overloaded, "IdbNotReady", "the engine is still loading databases")
}

// --- internal / IO -----------------------------------------------------------

pub fn dont_have_lock() -> anyhow::Error {
    err(ErrorCode::Internal, "DontHaveLock", "don't have lock on file")
}

pub fn lock_already_released() -> anyhow::Error {
    err(ErrorCode::Internal, "LockAlreadyReleased", "lock was already released")
}

/// Wrap a lower-level IO or (de)serialization error as an internal error,
/// preserving the original cause in the anyhow chain.
pub fn internal(context: &'static str, source: impl std::error::Error + Send + Sync + 'static) -> anyhow::Error {
    anyhow::Error::new(source)
        .context(context.to_string())
        .context(ErrorMetadata::internal("Internal", context))
}

/// Extension trait mirroring `anyhow::Context` for attaching
/// [`ErrorMetadata`] directly.
pub trait ErrorMetadataContext<T> {
    fn with_metadata(self, metadata: ErrorMetadata) -> anyhow::Result<T>;
}

impl<T, E> ErrorMetadataContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_metadata(self, metadata: ErrorMetadata) -> anyhow::Result<T> {
        self.context(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_through_anyhow_chain() {
        let e = table_does_not_exist();
        let m = metadata(&e).expect("metadata attached");
        assert_eq!(m.code, ErrorCode::NotFound);
        assert_eq!(m.short_msg, "TableDoesNotExist");
        assert_eq!(m.status_code(), 404);
    }

    #[test]
    fn status_codes_match_spec_groups() {
        assert_eq!(metadata(&not_a_valid_operator()).unwrap().status_code(), 400);
        assert_eq!(metadata(&database_already_exists()).unwrap().status_code(), 409);
        assert_eq!(metadata(&idb_not_ready()).unwrap().status_code(), 503);
    }
}
