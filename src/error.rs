//! Module for the error management
use thiserror::Error;

/// An error raised while editing or indexing feed data.
///
/// Only programming and data-corruption conditions live here. Data-quality
/// findings (a bad cell value, a dangling reference) are collected into
/// [crate::ValidationError] values and returned as data instead.
#[derive(Error, Debug)]
pub enum Error {
    /// A table name that is not part of the feed schema
    #[error("`{0}` is not a table of the feed schema")]
    UnknownTable(String),
    /// A key field required to identify a record is absent or empty
    #[error("cannot encode a `{table}` key: field `{field}` is absent or empty")]
    MissingKeyField {
        /// Table whose key was being encoded
        table: &'static str,
        /// The absent key field
        field: &'static str,
    },
    /// A key string that does not decode under the table's key shape
    #[error("`{key}` is not a valid `{table}` key: {reason}")]
    MalformedKey {
        /// Table whose key was being decoded
        table: &'static str,
        /// The offending key string
        key: String,
        /// Why the key could not be decoded
        reason: String,
    },
    /// The schema was used in a way it does not support
    #[error("schema misuse: {0}")]
    Schema(String),
    /// The store or a record batch violates a structural invariant
    #[error("integrity violation: {0}")]
    Integrity(String),
}
