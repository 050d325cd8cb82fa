/*! Relational integrity and timetable alignment core for editing transit feeds.

A feed is a set of related tables (agencies, routes, trips, stops, stop
times, calendars, shapes…) that a user edits cell by cell rather than by
replacing files. This crate is the engine that keeps those tables consistent
under such edits.

## What it provides

- a [TableSchema] registry describing every table's fields and identity-key
  shape (see [describe]);
- a key codec ([encode] / [decode]) turning a record's identity into a store
  key string and back;
- a field type layer ([FieldType]) parsing, formatting and validating typed
  cells — rollover clock times, `YYYYMMDD` dates, colors, coordinates;
- a validation and casting engine ([validate_table] / [validate_feed])
  collecting every violation of a batch in one pass;
- a relationship [Resolver] answering forward and reverse reference queries
  over a snapshot;
- the timetable engine: [generate_timetable_data] aligns every trip of a
  route onto one canonical stop supersequence, and [renumber_stop_sequences]
  re-derives dense `stop_sequence` numbers after an edit through a staged
  delete-and-reinsert (the sequence number is part of the composite identity
  and is never patched in place).

## What it does not provide

Rendering, container formats (zip/CSV) and durability stay outside. Rows
enter as already-tokenized [Record] maps, and writes go through the caller's
[RowStore].

## Design decisions

The registry is a hand-authored descriptor table, not runtime reflection:
one language-neutral source of truth for field names, types and keys.

The resolver is a value built from an immutable snapshot. It is never
mutated; refreshing means building a new one.

Per-row data-quality findings are collected and returned, never raised.
Codec misuse and store corruption raise [Error] immediately.
*/
#![warn(missing_docs)]

pub mod error;
mod field_types;
mod key;
mod resolver;
mod schema;
mod store;
mod timetable;
mod validation;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

/// A tokenized row: field identifier → raw string value.
///
/// Exactly what an external importer produces from one line of a feed file;
/// header names match the registry's field identifiers.
pub type Record = HashMap<String, String>;

pub use error::Error;
pub use field_types::{
    format_color, format_date, format_time, parse_color, parse_date, parse_time, FieldCheck,
};
pub use key::{decode, encode, KEY_DELIMITER};
pub use resolver::{EnhancedRoute, EnhancedStop, EnhancedTrip, Resolver};
pub use schema::{describe, FieldSpec, FieldType, KeyConfig, TableId, TableSchema};
pub use store::{MemoryStore, RowStore};
pub use timetable::{
    align_stop_sequences, generate_timetable_data, renumber_stop_sequences, slot_indices,
    StopSlot, TimetableData, TripColumn,
};
pub use validation::{
    get_field_errors, suggest_fixes, validate_feed, validate_table, IssueKind, TableValidation,
    ValidationError, ValidationOptions,
};
