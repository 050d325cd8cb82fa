//! Read-side reference resolution over a fixed snapshot.
//!
//! A [Resolver] is a value: it indexes the snapshot it was built from and is
//! never mutated afterwards. Refreshing after an external write means
//! building a new resolver and swapping the reference the caller holds.

use crate::key;
use crate::schema::TableId;
use crate::{Error, Record};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Identity indices over one immutable snapshot of the feed's tables
pub struct Resolver {
    indices: FxHashMap<TableId, FxHashMap<String, Record>>,
}

/// A stop together with its station hierarchy and the routes serving it
#[derive(Debug, Serialize)]
pub struct EnhancedStop<'a> {
    /// The root stop
    pub stop: &'a Record,
    /// Its parent station, when `parent_station` is populated and resolves
    pub parent: Option<&'a Record>,
    /// Stops naming this one as their parent station
    pub children: Vec<&'a Record>,
    /// Routes with at least one trip calling at this stop
    pub serving_routes: Vec<&'a Record>,
}

/// A trip together with its route, service and ordered stop times
#[derive(Debug, Serialize)]
pub struct EnhancedTrip<'a> {
    /// The root trip
    pub trip: &'a Record,
    /// The route the trip runs on, when it resolves
    pub route: Option<&'a Record>,
    /// The weekly service pattern, when defined in `calendar`
    pub service: Option<&'a Record>,
    /// The trip's stop times, ordered by `stop_sequence`
    pub stop_times: Vec<&'a Record>,
}

/// A route together with its agency and trips
#[derive(Debug, Serialize)]
pub struct EnhancedRoute<'a> {
    /// The root route
    pub route: &'a Record,
    /// The operating agency, when `agency_id` is populated and resolves
    pub agency: Option<&'a Record>,
    /// All trips running on the route
    pub trips: Vec<&'a Record>,
}

impl Resolver {
    /// Builds the per-table identity indices from a snapshot.
    ///
    /// Every row must encode under its table's key shape, and keys must be
    /// unique; a duplicate is an [Error::Integrity] since the snapshot is
    /// expected to come out of a store that enforces uniqueness.
    pub fn new(snapshot: &BTreeMap<TableId, Vec<Record>>) -> Result<Resolver, Error> {
        let mut indices: FxHashMap<TableId, FxHashMap<String, Record>> = FxHashMap::default();
        for (table, rows) in snapshot {
            let index = indices.entry(*table).or_default();
            for row in rows {
                let encoded = key::encode(*table, row)?;
                if index.insert(encoded.clone(), row.clone()).is_some() {
                    return Err(Error::Integrity(format!(
                        "snapshot of `{table}` holds two rows under key `{encoded}`"
                    )));
                }
            }
        }
        Ok(Resolver { indices })
    }

    /// Looks a record up by its encoded identity key
    pub fn get(&self, table: TableId, key: &str) -> Option<&Record> {
        self.indices.get(&table)?.get(key)
    }

    /// Follows a reference field of `record` into `target`.
    ///
    /// `None` when the field is absent, empty, or matches nothing.
    pub fn resolve_reference(
        &self,
        record: &Record,
        field: &str,
        target: TableId,
    ) -> Option<&Record> {
        let value = record.get(field).filter(|v| !v.is_empty())?;
        self.get(target, value)
    }

    /// Finds every `source_table` record whose `source_field` equals
    /// `target_key`. A full scan; acceptable over snapshot-sized tables.
    ///
    /// Results come back ordered by the source records' own keys so the
    /// answer is stable across runs.
    pub fn find_referencing(
        &self,
        target_key: &str,
        source_table: TableId,
        source_field: &str,
    ) -> Vec<&Record> {
        let index = match self.indices.get(&source_table) {
            Some(index) => index,
            None => return Vec::new(),
        };
        let mut hits: Vec<(&String, &Record)> = index
            .iter()
            .filter(|(_, record)| {
                record.get(source_field).map(String::as_str) == Some(target_key)
            })
            .collect();
        hits.sort_by(|(a, _), (b, _)| a.cmp(b));
        hits.into_iter().map(|(_, record)| record).collect()
    }

    /// Aggregates a stop with its hierarchy and serving routes.
    ///
    /// `None`, never an error, when `stop_id` matches nothing. Serving
    /// routes are reached through StopTime → Trip → Route, deduplicated,
    /// in the order the stop's stop times are keyed.
    pub fn enhance_stop(&self, stop_id: &str) -> Option<EnhancedStop<'_>> {
        let stop = self.get(TableId::Stops, stop_id)?;
        let parent = self.resolve_reference(stop, "parent_station", TableId::Stops);
        let children = self.find_referencing(stop_id, TableId::Stops, "parent_station");

        let mut serving_routes: Vec<&Record> = Vec::new();
        let mut seen_routes: Vec<&str> = Vec::new();
        for stop_time in self.find_referencing(stop_id, TableId::StopTimes, "stop_id") {
            let trip = match self.resolve_reference(stop_time, "trip_id", TableId::Trips) {
                Some(trip) => trip,
                None => continue,
            };
            let route_id = match trip.get("route_id") {
                Some(id) if !id.is_empty() => id.as_str(),
                _ => continue,
            };
            if seen_routes.contains(&route_id) {
                continue;
            }
            seen_routes.push(route_id);
            if let Some(route) = self.get(TableId::Routes, route_id) {
                serving_routes.push(route);
            }
        }

        Some(EnhancedStop {
            stop,
            parent,
            children,
            serving_routes,
        })
    }

    /// Aggregates a trip with its route, service and ordered stop times
    pub fn enhance_trip(&self, trip_id: &str) -> Option<EnhancedTrip<'_>> {
        let trip = self.get(TableId::Trips, trip_id)?;
        let route = self.resolve_reference(trip, "route_id", TableId::Routes);
        let service = self.resolve_reference(trip, "service_id", TableId::Calendar);
        let mut stop_times = self.find_referencing(trip_id, TableId::StopTimes, "trip_id");
        stop_times.sort_by_key(|record| {
            record
                .get("stop_sequence")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(u64::MAX)
        });
        Some(EnhancedTrip {
            trip,
            route,
            service,
            stop_times,
        })
    }

    /// Aggregates a route with its agency and trips
    pub fn enhance_route(&self, route_id: &str) -> Option<EnhancedRoute<'_>> {
        let route = self.get(TableId::Routes, route_id)?;
        let agency = self.resolve_reference(route, "agency_id", TableId::Agency);
        let trips = self.find_referencing(route_id, TableId::Trips, "route_id");
        Some(EnhancedRoute {
            route,
            agency,
            trips,
        })
    }
}
