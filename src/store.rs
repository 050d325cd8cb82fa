//! The abstract keyed row store the engine writes through.
//!
//! Durability lives outside this crate; the engine only requires the five
//! operations of [RowStore] and leans on the key codec for addressing.
//! [MemoryStore] is the reference implementation used by the tests and is
//! the behavioral contract an external store must honor.

use crate::key;
use crate::schema::{describe, TableId};
use crate::{Error, Record};
use log::trace;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// The keyed store consumed by the engine.
///
/// One logical writer at a time; a caller must let each call return before
/// issuing a dependent one. Multi-row inserts are all-or-nothing.
pub trait RowStore {
    /// Fetches one record by its encoded identity key
    fn get_row(&self, table: TableId, key: &str) -> Result<Option<Record>, Error>;

    /// Returns every record of `table` matching `filter`, in key order
    fn query_rows(
        &self,
        table: TableId,
        filter: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, Error>;

    /// Inserts a batch of records.
    ///
    /// Fails hard with [Error::Integrity] if any record's key collides with
    /// an existing row or with another record of the batch; on failure
    /// nothing is applied.
    fn insert_rows(&mut self, table: TableId, rows: Vec<Record>) -> Result<(), Error>;

    /// Deletes one record; deleting an absent key is an [Error::Integrity]
    fn delete_row(&mut self, table: TableId, key: &str) -> Result<(), Error>;

    /// Merges `patch` into an existing record.
    ///
    /// A patch naming a key-forming field is an [Error::Integrity]: identity
    /// changes go through delete-then-insert, never in-place mutation.
    fn update_row(&mut self, table: TableId, key: &str, patch: &Record) -> Result<(), Error>;
}

/// In-memory [RowStore] backed by one ordered map per table
#[derive(Default)]
pub struct MemoryStore {
    tables: FxHashMap<TableId, BTreeMap<String, Record>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Builds a store from per-table record batches, enforcing key
    /// uniqueness along the way
    pub fn from_tables(tables: BTreeMap<TableId, Vec<Record>>) -> Result<MemoryStore, Error> {
        let mut store = MemoryStore::new();
        for (table, rows) in tables {
            store.insert_rows(table, rows)?;
        }
        Ok(store)
    }

    /// Number of rows currently held for `table`
    pub fn row_count(&self, table: TableId) -> usize {
        self.tables.get(&table).map(BTreeMap::len).unwrap_or(0)
    }
}

impl RowStore for MemoryStore {
    fn get_row(&self, table: TableId, key: &str) -> Result<Option<Record>, Error> {
        Ok(self.tables.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn query_rows(
        &self,
        table: TableId,
        filter: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, Error> {
        Ok(self
            .tables
            .get(&table)
            .into_iter()
            .flat_map(|t| t.values())
            .filter(|r| filter(r))
            .cloned()
            .collect())
    }

    fn insert_rows(&mut self, table: TableId, rows: Vec<Record>) -> Result<(), Error> {
        let existing = self.tables.entry(table).or_default();
        let mut staged: BTreeMap<String, Record> = BTreeMap::new();
        for row in rows {
            let encoded = key::encode(table, &row)?;
            if existing.contains_key(&encoded) || staged.contains_key(&encoded) {
                return Err(Error::Integrity(format!(
                    "a `{table}` row under key `{encoded}` already exists"
                )));
            }
            staged.insert(encoded, row);
        }
        trace!("inserting {} rows into `{table}`", staged.len());
        existing.append(&mut staged);
        Ok(())
    }

    fn delete_row(&mut self, table: TableId, key: &str) -> Result<(), Error> {
        let removed = self.tables.get_mut(&table).and_then(|t| t.remove(key));
        match removed {
            Some(_) => {
                trace!("deleted `{table}` row `{key}`");
                Ok(())
            }
            None => Err(Error::Integrity(format!(
                "no `{table}` row under key `{key}` to delete"
            ))),
        }
    }

    fn update_row(&mut self, table: TableId, key: &str, patch: &Record) -> Result<(), Error> {
        let schema = describe(table);
        for field in patch.keys() {
            if schema.is_key_field(field) {
                return Err(Error::Integrity(format!(
                    "field `{field}` forms the `{table}` key and cannot be patched in place"
                )));
            }
        }
        let row = self
            .tables
            .get_mut(&table)
            .and_then(|t| t.get_mut(key))
            .ok_or_else(|| {
                Error::Integrity(format!("no `{table}` row under key `{key}` to update"))
            })?;
        for (field, value) in patch {
            if value.is_empty() {
                row.remove(field);
            } else {
                row.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }
}
