//! Timetable alignment and stop-sequence renumbering.
//!
//! The alignment half folds every trip's stop order into one canonical
//! supersequence of slots, so a grid can show one row per slot and one
//! column per trip without reordering any trip's own stops. The
//! renumbering half re-derives a trip's dense `1..N` sequence numbers after
//! an edit; since `stop_sequence` is part of the composite identity, a
//! changed numbering is applied as one staged delete-and-reinsert.

use crate::schema::{FieldType, TableId};
use crate::store::RowStore;
use crate::{key, Error, Record};
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;

/// One row of an aligned timetable grid
#[derive(Debug, Serialize, Clone)]
pub struct StopSlot {
    /// The stop occupying this slot
    pub stop_id: String,
    /// Its display name, when the stop record is known to the store
    pub stop_name: Option<String>,
}

/// One column of an aligned timetable grid
#[derive(Debug, Serialize, Clone)]
pub struct TripColumn {
    /// The trip shown in this column
    pub trip_id: String,
    /// Its headsign, for the column header
    pub headsign: Option<String>,
    /// One cell per slot: `None` where the trip skips the slot, otherwise
    /// the display time (empty when the visit carries no time)
    pub times: Vec<Option<String>>,
}

/// An aligned timetable for one route and service
#[derive(Debug, Serialize, Clone)]
pub struct TimetableData {
    /// Slots in canonical supersequence order
    pub stops: Vec<StopSlot>,
    /// Trip columns, ordered by first departure
    pub trips: Vec<TripColumn>,
}

/// Folds every trip's ordered stop visits into one supersequence of slots.
///
/// Each trip's own visits project onto strictly increasing slot indices
/// (see [slot_indices]). Trips whose relative stop orders conflict cannot
/// share slots for the conflicting stops; the first-seen order wins and the
/// later trip gets extra slots, with no error raised. Callers pass trips
/// sorted by first departure time so "first seen" is well defined.
pub fn align_stop_sequences(trip_stop_ids: &[Vec<String>]) -> Vec<String> {
    let mut slots: Vec<String> = Vec::new();
    for visits in trip_stop_ids {
        // Insertion cursor: every stop of this trip must land strictly
        // after the previous one.
        let mut cursor = 0usize;
        for stop_id in visits {
            match slots[cursor..].iter().position(|slot| slot == stop_id) {
                Some(offset) => cursor += offset + 1,
                None => {
                    slots.insert(cursor, stop_id.clone());
                    cursor += 1;
                }
            }
        }
    }
    slots
}

/// Projects one trip's visits onto slot indices of a supersequence.
///
/// For a supersequence produced by [align_stop_sequences] over this trip,
/// the returned indices are strictly increasing and complete; a visit that
/// cannot be placed (foreign supersequence) is skipped.
pub fn slot_indices(slots: &[String], visits: &[String]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(visits.len());
    let mut cursor = 0usize;
    for stop_id in visits {
        if let Some(offset) = slots[cursor..].iter().position(|slot| slot == stop_id) {
            indices.push(cursor + offset);
            cursor += offset + 1;
        }
    }
    indices
}

/// Canonical `(arrival ?? departure)` sort key of a stop-time row.
///
/// `None` when neither field holds a parseable time; such rows order after
/// every timed row.
fn time_key(record: &Record) -> Option<String> {
    for field in ["arrival_time", "departure_time"] {
        if let Some(raw) = record.get(field).filter(|v| !v.is_empty()) {
            if let Some(canonical) = FieldType::Time.to_canonical(raw) {
                return Some(canonical);
            }
        }
    }
    None
}

/// Display time for a grid cell: departure when present, else arrival
fn cell_time(record: &Record) -> String {
    for field in ["departure_time", "arrival_time"] {
        if let Some(raw) = record.get(field).filter(|v| !v.is_empty()) {
            if let Some(canonical) = FieldType::Time.to_canonical(raw) {
                return FieldType::Time.to_display(&canonical);
            }
        }
    }
    String::new()
}

fn numeric_sequence(record: &Record) -> Option<u32> {
    record
        .get("stop_sequence")
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Zero-padded times compare correctly as strings even past hour 23;
/// untimed rows sort last.
fn compare_time_keys(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn stop_times_of_trip(store: &dyn RowStore, trip_id: &str) -> Result<Vec<Record>, Error> {
    let mut rows = store.query_rows(TableId::StopTimes, &|record| {
        record.get("trip_id").map(String::as_str) == Some(trip_id)
    })?;
    // Key order is lexicographic; the trip's own order is numeric.
    rows.sort_by_key(|record| numeric_sequence(record).unwrap_or(u32::MAX));
    Ok(rows)
}

/// Builds the aligned timetable for one route and service.
///
/// Trips are filtered by `direction_id` when `direction` is given, ordered
/// by their first departure, aligned into one supersequence, and projected
/// into per-slot display times.
pub fn generate_timetable_data(
    store: &dyn RowStore,
    route_id: &str,
    service_id: &str,
    direction: Option<&str>,
) -> Result<TimetableData, Error> {
    let trips = store.query_rows(TableId::Trips, &|record| {
        record.get("route_id").map(String::as_str) == Some(route_id)
            && record.get("service_id").map(String::as_str) == Some(service_id)
            && direction
                .map(|d| record.get("direction_id").map(String::as_str) == Some(d))
                .unwrap_or(true)
    })?;

    let mut columns: Vec<(String, Record, Vec<Record>)> = Vec::with_capacity(trips.len());
    for trip in trips {
        let trip_id = trip
            .get("trip_id")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Integrity("a trip row has no trip_id".to_owned()))?
            .clone();
        let stop_times = stop_times_of_trip(store, &trip_id)?;
        columns.push((trip_id, trip, stop_times));
    }
    // First departure decides the canonical trip order, and with it the
    // first-seen order used to settle alignment conflicts.
    columns.sort_by(|(a_id, _, a_times), (b_id, _, b_times)| {
        let a_key = a_times.first().and_then(time_key);
        let b_key = b_times.first().and_then(time_key);
        compare_time_keys(&a_key, &b_key).then_with(|| a_id.cmp(b_id))
    });

    // A stop time without a stop cannot occupy a slot; it is left out of
    // the grid entirely so its time never lands in a neighbor's cell.
    let placed_lists: Vec<Vec<&Record>> = columns
        .iter()
        .map(|(_, _, stop_times)| {
            stop_times
                .iter()
                .filter(|st| st.get("stop_id").is_some_and(|v| !v.is_empty()))
                .collect()
        })
        .collect();
    let visit_lists: Vec<Vec<String>> = placed_lists
        .iter()
        .map(|placed| {
            placed
                .iter()
                .filter_map(|st| st.get("stop_id").cloned())
                .collect()
        })
        .collect();
    let slots = align_stop_sequences(&visit_lists);

    let stops = slots
        .iter()
        .map(|stop_id| {
            let stop_name = store
                .get_row(TableId::Stops, stop_id)?
                .and_then(|stop| stop.get("stop_name").cloned());
            Ok(StopSlot {
                stop_id: stop_id.clone(),
                stop_name,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let trips = columns
        .iter()
        .zip(&placed_lists)
        .zip(&visit_lists)
        .map(|(((trip_id, trip, _), placed), visits)| {
            let mut times: Vec<Option<String>> = vec![None; slots.len()];
            for (slot, stop_time) in slot_indices(&slots, visits).into_iter().zip(placed) {
                times[slot] = Some(cell_time(stop_time));
            }
            TripColumn {
                trip_id: trip_id.clone(),
                headsign: trip.get("trip_headsign").cloned(),
                times,
            }
        })
        .collect();

    Ok(TimetableData { stops, trips })
}

/// Recomputes a trip's `stop_sequence` numbers after an edit.
///
/// Rows are ordered by their canonical `(arrival ?? departure)` time,
/// untimed rows after all timed ones, ties and untimed runs keeping their
/// prior relative order via the current sequence number. If the resulting
/// order already carries dense numbers `1..N`, nothing is written.
/// Otherwise every row of the trip is deleted and reinserted with dense
/// numbers as one logical unit: the old rows are staged in memory first and
/// restored on any failure, so an error leaves the store as it was.
///
/// A row lacking a parseable `stop_sequence` is an [Error::Integrity]; the
/// operation fails before any write.
pub fn renumber_stop_sequences(store: &mut dyn RowStore, trip_id: &str) -> Result<(), Error> {
    if trip_id.is_empty() {
        return Err(Error::Integrity(
            "cannot renumber stop times without a trip_id".to_owned(),
        ));
    }
    let rows = stop_times_of_trip(store, trip_id)?;

    let mut entries: Vec<(Option<String>, u32, Record)> = Vec::with_capacity(rows.len());
    for row in rows {
        let sequence = numeric_sequence(&row).ok_or_else(|| {
            Error::Integrity(format!(
                "a stop time of trip `{trip_id}` has no usable stop_sequence"
            ))
        })?;
        entries.push((time_key(&row), sequence, row));
    }
    entries.sort_by(|(a_time, a_seq, _), (b_time, b_seq, _)| {
        compare_time_keys(a_time, b_time).then_with(|| a_seq.cmp(b_seq))
    });

    if entries
        .iter()
        .enumerate()
        .all(|(i, (_, sequence, _))| *sequence as usize == i + 1)
    {
        debug!("stop times of trip `{trip_id}` already numbered; nothing to write");
        return Ok(());
    }

    // Stage both sides of the swap before touching the store.
    let old_rows: Vec<Record> = entries.iter().map(|(_, _, row)| row.clone()).collect();
    let new_rows: Vec<Record> = entries
        .iter()
        .enumerate()
        .map(|(i, (_, _, row))| {
            let mut renumbered = row.clone();
            renumbered.insert("stop_sequence".to_owned(), (i + 1).to_string());
            renumbered
        })
        .collect();

    let mut deleted: Vec<Record> = Vec::with_capacity(old_rows.len());
    for row in &old_rows {
        let encoded = key::encode(TableId::StopTimes, row)?;
        if let Err(err) = store.delete_row(TableId::StopTimes, &encoded) {
            restore(store, trip_id, deleted);
            return Err(err);
        }
        deleted.push(row.clone());
    }

    if let Err(err) = store.insert_rows(TableId::StopTimes, new_rows) {
        restore(store, trip_id, deleted);
        return Err(err);
    }

    debug!(
        "renumbered {} stop times of trip `{trip_id}`",
        entries.len()
    );
    Ok(())
}

/// Puts previously deleted rows back after a failed swap. Best effort: a
/// store that fails the restore too leaves the trip short, which is why the
/// failure is logged loudly rather than swallowed.
fn restore(store: &mut dyn RowStore, trip_id: &str, rows: Vec<Record>) {
    if rows.is_empty() {
        return;
    }
    if let Err(err) = store.insert_rows(TableId::StopTimes, rows) {
        warn!("could not restore stop times of trip `{trip_id}` after a failed renumber: {err}");
    }
}
