//! Batch validation and casting of tokenized rows.
//!
//! Per-row findings are collected, never raised: one pass over a large table
//! reports every violation at once. Only the codec and the store raise
//! [crate::Error] values.

use crate::key;
use crate::schema::{describe, KeyConfig, TableId};
use crate::Record;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Knobs for a validation run
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationOptions {
    /// Abort the batch at the first row error instead of collecting them all
    pub strict: bool,
    /// After per-table validation, recheck every declared reference field
    /// against the identity indices of the other tables
    pub validate_foreign_keys: bool,
}

/// What went wrong with one field of one row
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required field is absent or empty
    MissingField,
    /// The row carries a field the schema does not declare
    UnknownField,
    /// A present value does not parse under the field's type tag
    BadType,
    /// Two rows of the batch share one identity key
    DuplicateKey,
    /// A populated reference field matches no record in its target table
    Reference,
}

/// One collected validation finding.
///
/// `row` is the index into the input batch for per-row findings, and into
/// the surviving `records` for reference findings appended by
/// [validate_feed] (the feed pass only ever sees rows that validated).
#[derive(Debug, Serialize, Clone)]
pub struct ValidationError {
    /// Index of the offending row
    pub row: usize,
    /// The offending field, when the finding is field-scoped
    pub field: Option<String>,
    /// Classification of the finding
    pub kind: IssueKind,
    /// Human-readable description
    pub message: String,
}

/// Result of validating one table's batch of rows
#[derive(Debug, Serialize, Clone, Default)]
pub struct TableValidation {
    /// True when `errors` is empty
    pub success: bool,
    /// The rows that validated, cast to canonical form
    pub records: Vec<Record>,
    /// Hard findings; each failing row is excluded from `records`
    pub errors: Vec<ValidationError>,
    /// Soft findings; the rows they concern are kept
    pub warnings: Vec<ValidationError>,
}

fn field_error(row: usize, field: &str, kind: IssueKind, message: String) -> ValidationError {
    ValidationError {
        row,
        field: Some(field.to_owned()),
        kind,
        message,
    }
}

/// Validates and casts one table's rows.
///
/// Required-field violations are errors and exclude the row from `records`.
/// A present value that fails its type tag is a warning; the row is kept
/// with that value left raw. Values that do parse are replaced by their
/// canonical form. Duplicate identity keys within the batch are errors on
/// the later row. Input rows are never mutated.
pub fn validate_table(table: TableId, rows: &[Record], opts: &ValidationOptions) -> TableValidation {
    let schema = describe(table);
    let mut out = TableValidation::default();
    let mut seen_keys: HashSet<String> = HashSet::new();

    for (row_index, row) in rows.iter().enumerate() {
        let mut record = Record::new();
        let mut row_errors: Vec<ValidationError> = Vec::new();

        for name in row.keys() {
            if schema.field(name).is_none() {
                out.warnings.push(field_error(
                    row_index,
                    name,
                    IssueKind::UnknownField,
                    format!("`{name}` is not a field of `{table}`"),
                ));
            }
        }

        for spec in schema.fields {
            let raw = row.get(spec.name).map(String::as_str).unwrap_or("");
            if raw.is_empty() {
                if spec.required {
                    row_errors.push(field_error(
                        row_index,
                        spec.name,
                        IssueKind::MissingField,
                        format!("required field `{}` is absent or empty", spec.name),
                    ));
                }
                continue;
            }
            match spec.field_type.to_canonical(raw) {
                Some(canonical) => {
                    record.insert(spec.name.to_owned(), canonical);
                }
                None => {
                    let check = spec.field_type.validate(raw);
                    out.warnings.push(field_error(
                        row_index,
                        spec.name,
                        IssueKind::BadType,
                        check.reason.unwrap_or_else(|| {
                            format!("`{raw}` does not fit field `{}`", spec.name)
                        }),
                    ));
                    record.insert(spec.name.to_owned(), raw.to_owned());
                }
            }
        }

        if row_errors.is_empty() {
            match key::encode(table, &record) {
                Ok(encoded) if !seen_keys.insert(encoded.clone()) => {
                    let message = if schema.key == KeyConfig::SingleRow {
                        format!("`{table}` allows at most one row")
                    } else {
                        format!("identity key `{encoded}` appears more than once")
                    };
                    row_errors.push(ValidationError {
                        row: row_index,
                        field: None,
                        kind: IssueKind::DuplicateKey,
                        message,
                    });
                }
                Ok(_) => {}
                // Required-field checks passed, so an encode failure means a
                // key field is optional in the schema yet empty here.
                Err(err) => row_errors.push(ValidationError {
                    row: row_index,
                    field: None,
                    kind: IssueKind::MissingField,
                    message: err.to_string(),
                }),
            }
        }

        if row_errors.is_empty() {
            out.records.push(record);
        } else {
            out.errors.extend(row_errors);
            if opts.strict {
                break;
            }
        }
    }

    out.success = out.errors.is_empty();
    debug!(
        "validated {} rows of `{table}`: {} kept, {} errors, {} warnings",
        rows.len(),
        out.records.len(),
        out.errors.len(),
        out.warnings.len()
    );
    out
}

/// Validates a whole feed, table by table.
///
/// With `validate_foreign_keys`, identity indices are built from each
/// table's surviving records via the key codec, strictly after every table
/// validated individually, and each populated declared reference field is
/// rechecked against its target. Empty optional references are skipped.
/// A `service_id` resolves against services defined by either `calendar`
/// or `calendar_dates`.
pub fn validate_feed(
    tables: &BTreeMap<TableId, Vec<Record>>,
    opts: &ValidationOptions,
) -> BTreeMap<TableId, TableValidation> {
    let mut results: BTreeMap<TableId, TableValidation> = tables
        .iter()
        .map(|(table, rows)| (*table, validate_table(*table, rows, opts)))
        .collect();

    if !opts.validate_foreign_keys {
        return results;
    }

    let mut indices: HashMap<TableId, HashSet<String>> = HashMap::new();
    for (table, result) in &results {
        let index = indices.entry(*table).or_default();
        for record in &result.records {
            if let Ok(encoded) = key::encode(*table, record) {
                index.insert(encoded);
            }
        }
    }
    // Services can be defined solely through day-level exceptions.
    let mut service_ids: HashSet<String> = indices
        .get(&TableId::Calendar)
        .cloned()
        .unwrap_or_default();
    if let Some(dates) = results.get(&TableId::CalendarDates) {
        for record in &dates.records {
            if let Some(id) = record.get("service_id") {
                service_ids.insert(id.clone());
            }
        }
    }

    for (table, result) in results.iter_mut() {
        let schema = describe(*table);
        let mut violations: Vec<ValidationError> = Vec::new();
        for (record_index, record) in result.records.iter().enumerate() {
            for spec in schema.fields {
                let target = match spec.references {
                    Some(target) => target,
                    None => continue,
                };
                let value = match record.get(spec.name) {
                    Some(v) if !v.is_empty() => v,
                    _ => continue,
                };
                let resolved = if target == TableId::Calendar {
                    service_ids.contains(value)
                } else {
                    indices.get(&target).is_some_and(|idx| idx.contains(value))
                };
                if !resolved {
                    violations.push(field_error(
                        record_index,
                        spec.name,
                        IssueKind::Reference,
                        format!(
                            "`{value}` does not match any `{}` record",
                            target.as_str()
                        ),
                    ));
                }
            }
        }
        if !violations.is_empty() {
            result.errors.extend(violations);
            result.success = false;
        }
    }

    results
}

/// Probes one record for field-level problems, for form surfaces.
///
/// Reports missing required fields and type failures on present values;
/// the record is not cast and nothing is thrown.
pub fn get_field_errors(table: TableId, record: &Record) -> Vec<ValidationError> {
    let schema = describe(table);
    let mut errors = Vec::new();
    for spec in schema.fields {
        let raw = record.get(spec.name).map(String::as_str).unwrap_or("");
        if raw.is_empty() {
            if spec.required {
                errors.push(field_error(
                    0,
                    spec.name,
                    IssueKind::MissingField,
                    format!("required field `{}` is absent or empty", spec.name),
                ));
            }
            continue;
        }
        let check = spec.field_type.validate(raw);
        if !check.is_valid {
            errors.push(field_error(
                0,
                spec.name,
                IssueKind::BadType,
                check
                    .reason
                    .unwrap_or_else(|| format!("`{raw}` does not fit field `{}`", spec.name)),
            ));
        }
    }
    errors
}

/// Turns collected findings into short actionable hints
pub fn suggest_fixes(errors: &[ValidationError]) -> Vec<String> {
    errors
        .iter()
        .map(|error| {
            let field = error.field.as_deref().unwrap_or("the row");
            match error.kind {
                IssueKind::MissingField => format!("Fill in `{field}`; it is required."),
                IssueKind::UnknownField => {
                    format!("Remove `{field}` or rename it to a declared field.")
                }
                IssueKind::BadType => format!("Re-enter `{field}`: {}.", error.message),
                IssueKind::DuplicateKey => {
                    "Change the identifying fields so the row is unique, or delete the duplicate."
                        .to_owned()
                }
                IssueKind::Reference => format!(
                    "Point `{field}` at an existing record or clear it: {}.",
                    error.message
                ),
            }
        })
        .collect()
}
