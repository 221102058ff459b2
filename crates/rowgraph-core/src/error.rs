//! Error types.
//!
//! Nothing in the hydration core is retried: every variant describes a
//! programming or data-shape mistake, so hydration errors carry enough context
//! (target type, field, row index, caller offsets) to locate the bad offset or
//! the stale mapping without a debugger.

use std::fmt;

use crate::value::Value;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Where in a row a hydration failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrateSite {
    /// Fully-qualified name of the type being hydrated.
    pub type_name: &'static str,
    /// Field being assigned, or a bracketed marker such as `<sentinel>`.
    pub field: &'static str,
    /// Absolute index into the row that was read.
    pub row_index: usize,
    /// Offset supplied by the caller.
    pub starting_column: usize,
    /// Null-sentinel column supplied by the caller.
    pub pk_column: usize,
    /// Length of the row that was handed in.
    pub row_len: usize,
}

impl fmt::Display for HydrateSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} (row index {}, starting_column {}, pk_column {}, row length {})",
            self.type_name,
            self.field,
            self.row_index,
            self.starting_column,
            self.pk_column,
            self.row_len
        )
    }
}

/// The error type for mapping, hydration and SQL rewriting.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No mapping is registered for the type and none could be built.
    MappingNotFound { type_name: &'static str },
    /// A computed row index is past the end of the row.
    OutOfBoundsColumn(HydrateSite),
    /// A cell could not be converted to the field's type.
    TypeConversionFailure {
        site: HydrateSite,
        expected: &'static str,
        found: &'static str,
    },
    /// The null sentinel was assigned to a non-nullable field.
    NullSentinelOnRequiredField(HydrateSite),
    /// A field or column name does not exist on the mapping.
    UnknownField { type_name: &'static str, field: String },
    /// The operation needs exactly one primary-key column.
    UnsupportedKey {
        type_name: &'static str,
        key_columns: usize,
    },
    /// A SELECT statement could not be rewritten.
    SqlRewriteFailure { sql: String, reason: &'static str },
    /// A caller-supplied ORDER BY list failed validation.
    InvalidOrderBy { input: String, reason: String },
    /// A primary entity's key has no group in the joined-lists map.
    MissingGroupKey { type_name: &'static str, key: Value },
    /// Invalid configuration.
    Config(String),
    /// Failure reported by the query-execution collaborator.
    Query(String),
}

impl Error {
    /// The hydration site, for the variants that have one.
    pub fn site(&self) -> Option<&HydrateSite> {
        match self {
            Error::OutOfBoundsColumn(site)
            | Error::NullSentinelOnRequiredField(site)
            | Error::TypeConversionFailure { site, .. } => Some(site),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MappingNotFound { type_name } => {
                write!(f, "no entity mapping could be resolved for {type_name}")
            }
            Error::OutOfBoundsColumn(site) => write!(
                f,
                "column out of bounds hydrating {site}; check the starting_column offset \
                 and that the result set matches the mapping's column order"
            ),
            Error::TypeConversionFailure {
                site,
                expected,
                found,
            } => write!(
                f,
                "cannot convert {found} to {expected} hydrating {site}; the result set may not \
                 match the mapping's column order"
            ),
            Error::NullSentinelOnRequiredField(site) => write!(
                f,
                "NULL assigned to non-nullable field hydrating {site}; make the field optional \
                 or fix the offsets"
            ),
            Error::UnknownField { type_name, field } => {
                write!(f, "{type_name} has no mapped field named '{field}'")
            }
            Error::UnsupportedKey {
                type_name,
                key_columns,
            } => write!(
                f,
                "{type_name} declares {key_columns} primary-key columns; exactly one is required"
            ),
            Error::SqlRewriteFailure { sql, reason } => {
                write!(f, "unable to rewrite SQL for paging ({reason}): {sql}")
            }
            Error::InvalidOrderBy { input, reason } => {
                write!(f, "invalid ORDER BY '{input}': {reason}")
            }
            Error::MissingGroupKey { type_name, key } => {
                write!(f, "no joined group for {type_name} with key {key}")
            }
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Query(msg) => write!(f, "query failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> HydrateSite {
        HydrateSite {
            type_name: "app::Project",
            field: "name",
            row_index: 7,
            starting_column: 5,
            pk_column: 5,
            row_len: 6,
        }
    }

    #[test]
    fn test_out_of_bounds_message_names_offsets() {
        let msg = Error::OutOfBoundsColumn(site()).to_string();
        assert!(msg.contains("app::Project.name"));
        assert!(msg.contains("row index 7"));
        assert!(msg.contains("starting_column 5"));
        assert!(msg.contains("row length 6"));
    }

    #[test]
    fn test_site_accessor() {
        let err = Error::TypeConversionFailure {
            site: site(),
            expected: "i64",
            found: "TEXT",
        };
        assert_eq!(err.site().map(|s| s.row_index), Some(7));
        assert!(Error::Config("x".into()).site().is_none());
    }
}
