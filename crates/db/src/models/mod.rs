//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` struct matching the database row and,
//! where the core crate has a record type for it, the conversion into that
//! record. Enum-valued columns are stored as text and parsed on the way out.

pub mod audit;
pub mod comment;
pub mod dashboard;
pub mod location;
pub mod meowl;
pub mod points;
pub mod scan;
pub mod session;
pub mod update;
pub mod user;

use std::str::FromStr;

use meowl_core::error::CoreError;

/// Parse a text column into a core enum, reporting corrupt values as
/// internal errors.
pub(crate) fn parse_column<T>(column: &'static str, value: &str) -> Result<T, CoreError>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| CoreError::Internal(format!("Invalid {column} column: {e}")))
}
