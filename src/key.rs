//! The key codec: a record's identity as a string, and back.
//!
//! Every keyed operation in the crate — store rows, resolver indices, the
//! renumbering delete/insert pair — goes through [encode]. For natural and
//! composite keys the codec is a bijection between the key fields and the
//! key string.

use crate::schema::{describe, KeyConfig, TableId};
use crate::{Error, Record};

/// Separator between composite key parts and between all-fields pairs
pub const KEY_DELIMITER: char = '/';

fn key_part<'a>(table: TableId, record: &'a Record, field: &'static str) -> Result<&'a str, Error> {
    match record.get(field).map(String::as_str) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingKeyField {
            table: table.as_str(),
            field,
        }),
    }
}

/// Encodes `record`'s identity under `table`'s key shape.
///
/// - natural key: the key field's value;
/// - composite key: the key fields' values in declared order, joined by
///   [KEY_DELIMITER];
/// - all-fields key: every schema field as a `name=value` pair, sorted by
///   field name and joined by [KEY_DELIMITER]. Absent optional fields are
///   materialized with an empty value, so an omitted field and an explicitly
///   empty one encode identically and duplicate detection cannot miss;
/// - single-row table: the table identifier itself.
///
/// A required key field that is absent or empty is a
/// [Error::MissingKeyField].
pub fn encode(table: TableId, record: &Record) -> Result<String, Error> {
    let schema = describe(table);
    match schema.key {
        KeyConfig::Natural(field) => key_part(table, record, field).map(str::to_owned),
        KeyConfig::Composite(fields) => {
            let mut parts = Vec::with_capacity(fields.len());
            for field in fields {
                parts.push(key_part(table, record, field)?);
            }
            Ok(parts.join(&KEY_DELIMITER.to_string()))
        }
        KeyConfig::AllFields => {
            let mut names: Vec<&'static str> = schema.fields.iter().map(|f| f.name).collect();
            names.sort_unstable();
            let pairs: Vec<String> = names
                .into_iter()
                .map(|name| {
                    let value = record.get(name).map(String::as_str).unwrap_or("");
                    format!("{name}={value}")
                })
                .collect();
            Ok(pairs.join(&KEY_DELIMITER.to_string()))
        }
        KeyConfig::SingleRow => Ok(table.as_str().to_owned()),
    }
}

/// Decodes a key string back into the key fields it was built from.
///
/// The result is a partial record holding only key fields (and, for a
/// single-row table, nothing at all). A key that does not fit the table's
/// shape — wrong part count, a pair without `=`, a pair naming an unknown
/// field — is a [Error::MalformedKey].
pub fn decode(table: TableId, key: &str) -> Result<Record, Error> {
    let schema = describe(table);
    let malformed = |reason: String| Error::MalformedKey {
        table: table.as_str(),
        key: key.to_owned(),
        reason,
    };
    match schema.key {
        KeyConfig::Natural(field) => {
            if key.is_empty() {
                return Err(malformed("the key is empty".to_owned()));
            }
            let mut record = Record::new();
            record.insert(field.to_owned(), key.to_owned());
            Ok(record)
        }
        KeyConfig::Composite(fields) => {
            let parts: Vec<&str> = key.split(KEY_DELIMITER).collect();
            if parts.len() != fields.len() {
                return Err(malformed(format!(
                    "expected {} `{}`-separated parts, found {}",
                    fields.len(),
                    KEY_DELIMITER,
                    parts.len()
                )));
            }
            let mut record = Record::new();
            for (field, part) in fields.iter().zip(parts) {
                record.insert((*field).to_owned(), part.to_owned());
            }
            Ok(record)
        }
        KeyConfig::AllFields => {
            let mut record = Record::new();
            for pair in key.split(KEY_DELIMITER) {
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| malformed(format!("`{pair}` is not a field=value pair")))?;
                if schema.field(name).is_none() {
                    return Err(malformed(format!(
                        "`{name}` is not a field of `{}`",
                        table.as_str()
                    )));
                }
                record.insert(name.to_owned(), value.to_owned());
            }
            Ok(record)
        }
        KeyConfig::SingleRow => {
            if key != table.as_str() {
                return Err(malformed(format!(
                    "a single-row table key must be `{}`",
                    table.as_str()
                )));
            }
            Ok(Record::new())
        }
    }
}
