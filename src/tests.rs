use crate::schema::{describe, KeyConfig, TableId};
use crate::store::{MemoryStore, RowStore};
use crate::timetable::{
    align_stop_sequences, generate_timetable_data, renumber_stop_sequences, slot_indices,
};
use crate::validation::{
    get_field_errors, suggest_fixes, validate_feed, validate_table, IssueKind, ValidationOptions,
};
use crate::{decode, encode, Error, Record, Resolver};
use std::collections::BTreeMap;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn stop_time(trip: &str, stop: &str, seq: &str, arrival: &str, departure: &str) -> Record {
    record(&[
        ("trip_id", trip),
        ("stop_id", stop),
        ("stop_sequence", seq),
        ("arrival_time", arrival),
        ("departure_time", departure),
    ])
}

/// One route, one service, one three-stop trip, ready to edit.
fn fixture_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .insert_rows(
            TableId::Stops,
            vec![
                record(&[("stop_id", "A"), ("stop_name", "Alpha"), ("stop_lat", "45.500000"), ("stop_lon", "-73.560000")]),
                record(&[("stop_id", "B"), ("stop_name", "Bravo"), ("stop_lat", "45.510000"), ("stop_lon", "-73.570000")]),
                record(&[("stop_id", "C"), ("stop_name", "Charlie"), ("stop_lat", "45.520000"), ("stop_lon", "-73.580000")]),
            ],
        )
        .unwrap();
    store
        .insert_rows(
            TableId::Routes,
            vec![record(&[("route_id", "R1"), ("route_type", "3"), ("route_short_name", "1")])],
        )
        .unwrap();
    store
        .insert_rows(
            TableId::Trips,
            vec![record(&[
                ("trip_id", "T1"),
                ("route_id", "R1"),
                ("service_id", "S1"),
                ("direction_id", "0"),
            ])],
        )
        .unwrap();
    store
        .insert_rows(
            TableId::StopTimes,
            vec![
                stop_time("T1", "A", "1", "08:00:00", "08:00:00"),
                stop_time("T1", "B", "2", "08:05:00", "08:05:00"),
                stop_time("T1", "C", "3", "08:10:00", "08:10:00"),
            ],
        )
        .unwrap();
    store
}

#[test]
fn key_round_trip_reproduces_key_fields() {
    let cases: Vec<(TableId, Record)> = vec![
        (TableId::Stops, record(&[("stop_id", "S1"), ("stop_name", "x")])),
        (TableId::StopTimes, stop_time("T1", "A", "12", "", "")),
        (
            TableId::CalendarDates,
            record(&[("service_id", "S1"), ("date", "20240101"), ("exception_type", "1")]),
        ),
        (
            TableId::Shapes,
            record(&[
                ("shape_id", "SH1"),
                ("shape_pt_lat", "45.000000"),
                ("shape_pt_lon", "-73.000000"),
                ("shape_pt_sequence", "4"),
            ]),
        ),
    ];
    for (table, original) in cases {
        let decoded = decode(table, &encode(table, &original).unwrap()).unwrap();
        let schema = describe(table);
        for field in schema.fields {
            if schema.is_key_field(field.name) {
                assert_eq!(
                    decoded.get(field.name),
                    original.get(field.name),
                    "{table} key field {}",
                    field.name
                );
            }
        }
    }
}

#[test]
fn composite_key_shape() {
    let key = encode(TableId::StopTimes, &stop_time("T1", "A", "7", "", "")).unwrap();
    assert_eq!(key, "T1/7");
    assert!(matches!(
        decode(TableId::StopTimes, "T1"),
        Err(Error::MalformedKey { .. })
    ));
    assert!(matches!(
        decode(TableId::StopTimes, "T1/7/extra"),
        Err(Error::MalformedKey { .. })
    ));
}

#[test]
fn encode_rejects_absent_key_fields() {
    let no_sequence = record(&[("trip_id", "T1"), ("stop_id", "A")]);
    assert!(matches!(
        encode(TableId::StopTimes, &no_sequence),
        Err(Error::MissingKeyField { field: "stop_sequence", .. })
    ));
    let empty_id = record(&[("stop_id", ""), ("stop_name", "x")]);
    assert!(matches!(
        encode(TableId::Stops, &empty_id),
        Err(Error::MissingKeyField { field: "stop_id", .. })
    ));
}

#[test]
fn all_fields_key_is_sorted_and_total() {
    let frequency = record(&[
        ("trip_id", "T1"),
        ("start_time", "08:00:00"),
        ("end_time", "09:00:00"),
        ("headway_secs", "600"),
    ]);
    let key = encode(TableId::Frequencies, &frequency).unwrap();
    assert_eq!(
        key,
        "end_time=09:00:00/exact_times=/headway_secs=600/start_time=08:00:00/trip_id=T1"
    );

    // An omitted optional field and an explicitly empty one are the same row.
    let mut explicit = frequency.clone();
    explicit.insert("exact_times".to_owned(), String::new());
    assert_eq!(key, encode(TableId::Frequencies, &explicit).unwrap());

    let decoded = decode(TableId::Frequencies, &key).unwrap();
    assert_eq!(decoded.get("headway_secs").map(String::as_str), Some("600"));
}

#[test]
fn single_row_table_uses_constant_key() {
    let info = record(&[
        ("feed_publisher_name", "pub"),
        ("feed_publisher_url", "https://example.com"),
        ("feed_lang", "en"),
    ]);
    assert_eq!(encode(TableId::FeedInfo, &info).unwrap(), "feed_info");
    assert!(decode(TableId::FeedInfo, "feed_info").unwrap().is_empty());
    assert!(matches!(
        decode(TableId::FeedInfo, "something_else"),
        Err(Error::MalformedKey { .. })
    ));
}

#[test]
fn unknown_table_name_is_an_error() {
    assert!(matches!(
        "velocipedes".parse::<TableId>(),
        Err(Error::UnknownTable(_))
    ));
    assert_eq!("stop_times".parse::<TableId>().unwrap(), TableId::StopTimes);
}

#[test]
fn every_schema_key_field_is_declared() {
    for table in TableId::ALL {
        let schema = describe(table);
        match schema.key {
            KeyConfig::Natural(field) => assert!(schema.field(field).is_some(), "{table}"),
            KeyConfig::Composite(fields) => {
                for field in fields {
                    assert!(schema.field(field).is_some(), "{table}.{field}");
                }
            }
            KeyConfig::AllFields | KeyConfig::SingleRow => {}
        }
    }
}

#[test]
fn validate_table_collects_and_casts() {
    let rows = vec![
        // Valid, but with a non-canonical time and a stray column.
        record(&[
            ("trip_id", "T1"),
            ("stop_id", "A"),
            ("stop_sequence", "1"),
            ("departure_time", "8:05:00"),
            ("mystery", "x"),
        ]),
        // Required stop_id missing.
        record(&[("trip_id", "T1"), ("stop_sequence", "2")]),
        // Kept despite the unparseable time, which stays raw.
        record(&[
            ("trip_id", "T1"),
            ("stop_id", "C"),
            ("stop_sequence", "3"),
            ("departure_time", "past noon"),
        ]),
    ];
    let before = rows.clone();
    let result = validate_table(TableId::StopTimes, &rows, &ValidationOptions::default());
    // Casting happens on the output records; the input batch is untouched.
    assert_eq!(rows, before);
    assert!(!result.success);
    assert_eq!(result.records.len(), 2);
    assert_eq!(
        result.records[0].get("departure_time").map(String::as_str),
        Some("08:05:00")
    );
    assert_eq!(
        result.records[1].get("departure_time").map(String::as_str),
        Some("past noon")
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].row, 1);
    assert_eq!(result.errors[0].kind, IssueKind::MissingField);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == IssueKind::UnknownField && w.field.as_deref() == Some("mystery")));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == IssueKind::BadType && w.row == 2));
}

#[test]
fn strict_mode_aborts_at_first_error() {
    let rows = vec![
        record(&[("stop_id", "A"), ("stop_name", "Alpha"), ("stop_lat", "45"), ("stop_lon", "-73")]),
        record(&[("stop_id", "B")]),
        record(&[("stop_id", "C"), ("stop_name", "Charlie"), ("stop_lat", "45"), ("stop_lon", "-73")]),
    ];
    let strict = ValidationOptions {
        strict: true,
        ..Default::default()
    };
    let result = validate_table(TableId::Stops, &rows, &strict);
    assert!(!result.success);
    // Row C was never reached.
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.errors.iter().map(|e| e.row).max(), Some(1));
}

#[test]
fn duplicate_identity_keys_are_reported() {
    let rows = vec![
        stop_time("T1", "A", "1", "08:00:00", ""),
        stop_time("T1", "B", "1", "08:05:00", ""),
    ];
    let result = validate_table(TableId::StopTimes, &rows, &ValidationOptions::default());
    assert_eq!(result.records.len(), 1);
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == IssueKind::DuplicateKey && e.row == 1));

    let two_feed_infos = vec![
        record(&[("feed_publisher_name", "a"), ("feed_publisher_url", "u"), ("feed_lang", "en")]),
        record(&[("feed_publisher_name", "b"), ("feed_publisher_url", "u"), ("feed_lang", "en")]),
    ];
    let result = validate_table(TableId::FeedInfo, &two_feed_infos, &ValidationOptions::default());
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == IssueKind::DuplicateKey));
}

fn minimal_feed() -> BTreeMap<TableId, Vec<Record>> {
    let mut tables = BTreeMap::new();
    tables.insert(
        TableId::Routes,
        vec![record(&[("route_id", "R1"), ("route_type", "3")])],
    );
    tables.insert(
        TableId::Trips,
        vec![
            record(&[("trip_id", "T1"), ("route_id", "R1"), ("service_id", "S1")]),
            record(&[("trip_id", "T2"), ("route_id", "GHOST"), ("service_id", "S1")]),
        ],
    );
    tables.insert(
        TableId::CalendarDates,
        vec![record(&[("service_id", "S1"), ("date", "20240101"), ("exception_type", "1")])],
    );
    tables
}

#[test]
fn foreign_keys_checked_only_when_enabled() {
    let tables = minimal_feed();

    let lax = validate_feed(&tables, &ValidationOptions::default());
    assert!(lax[&TableId::Trips].success);

    let opts = ValidationOptions {
        validate_foreign_keys: true,
        ..Default::default()
    };
    let checked = validate_feed(&tables, &opts);
    let trips = &checked[&TableId::Trips];
    assert!(!trips.success);
    let violations: Vec<_> = trips
        .errors
        .iter()
        .filter(|e| e.kind == IssueKind::Reference)
        .collect();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field.as_deref(), Some("route_id"));
    assert!(violations[0].message.contains("GHOST"));
    // S1 exists only through calendar_dates, which is enough.
    assert!(!trips.errors.iter().any(|e| e.field.as_deref() == Some("service_id")));

    // An empty optional reference is not a violation.
    let route = &checked[&TableId::Routes];
    assert!(route.success, "{:?}", route.errors);
}

#[test]
fn field_errors_and_fix_suggestions() {
    let broken = record(&[("stop_id", "S1"), ("stop_lat", "91.0"), ("stop_lon", "-73.5")]);
    let errors = get_field_errors(TableId::Stops, &broken);
    assert!(errors
        .iter()
        .any(|e| e.kind == IssueKind::MissingField && e.field.as_deref() == Some("stop_name")));
    assert!(errors
        .iter()
        .any(|e| e.kind == IssueKind::BadType && e.field.as_deref() == Some("stop_lat")));

    let fixes = suggest_fixes(&errors);
    assert_eq!(fixes.len(), errors.len());
    assert!(fixes.iter().any(|f| f.contains("stop_name")));
}

fn resolver_snapshot() -> BTreeMap<TableId, Vec<Record>> {
    let mut tables = BTreeMap::new();
    tables.insert(
        TableId::Agency,
        vec![record(&[("agency_id", "AG"), ("agency_name", "Metro"), ("agency_url", "u"), ("agency_timezone", "America/Montreal")])],
    );
    tables.insert(
        TableId::Stops,
        vec![
            record(&[("stop_id", "STATION"), ("stop_name", "Central"), ("location_type", "1")]),
            record(&[("stop_id", "PLATFORM"), ("stop_name", "Central platform"), ("parent_station", "STATION")]),
        ],
    );
    tables.insert(
        TableId::Routes,
        vec![record(&[("route_id", "R1"), ("agency_id", "AG"), ("route_type", "1")])],
    );
    tables.insert(
        TableId::Trips,
        vec![record(&[("trip_id", "T1"), ("route_id", "R1"), ("service_id", "S1")])],
    );
    tables.insert(
        TableId::StopTimes,
        vec![stop_time("T1", "PLATFORM", "1", "06:00:00", "06:00:00")],
    );
    tables
}

#[test]
fn resolver_answers_forward_and_reverse_queries() {
    let resolver = Resolver::new(&resolver_snapshot()).unwrap();

    let platform = resolver.get(TableId::Stops, "PLATFORM").unwrap();
    let station = resolver
        .resolve_reference(platform, "parent_station", TableId::Stops)
        .unwrap();
    assert_eq!(station.get("stop_id").map(String::as_str), Some("STATION"));

    let children = resolver.find_referencing("STATION", TableId::Stops, "parent_station");
    assert_eq!(children.len(), 1);

    let enhanced = resolver.enhance_stop("PLATFORM").unwrap();
    assert!(enhanced.parent.is_some());
    assert_eq!(enhanced.serving_routes.len(), 1);
    assert_eq!(
        enhanced.serving_routes[0].get("route_id").map(String::as_str),
        Some("R1")
    );

    let trip = resolver.enhance_trip("T1").unwrap();
    assert!(trip.route.is_some());
    assert_eq!(trip.stop_times.len(), 1);

    let route = resolver.enhance_route("R1").unwrap();
    assert!(route.agency.is_some());
    assert_eq!(route.trips.len(), 1);

    assert!(resolver.enhance_stop("NOWHERE").is_none());
    assert!(resolver.enhance_trip("NOWHERE").is_none());
    assert!(resolver.enhance_route("NOWHERE").is_none());
}

#[test]
fn resolver_rejects_duplicate_snapshot_keys() {
    let mut tables = BTreeMap::new();
    tables.insert(
        TableId::StopTimes,
        vec![
            stop_time("T1", "A", "1", "", ""),
            stop_time("T1", "B", "1", "", ""),
        ],
    );
    assert!(matches!(Resolver::new(&tables), Err(Error::Integrity(_))));
}

#[test]
fn store_rejects_composite_key_collisions() {
    let mut store = fixture_store();
    let before = store.row_count(TableId::StopTimes);
    let duplicate = stop_time("T1", "Z", "2", "09:00:00", "");
    assert!(matches!(
        store.insert_rows(TableId::StopTimes, vec![duplicate]),
        Err(Error::Integrity(_))
    ));
    assert_eq!(store.row_count(TableId::StopTimes), before);
}

#[test]
fn store_protects_key_forming_fields() {
    let mut store = fixture_store();
    let patch = record(&[("stop_sequence", "9")]);
    assert!(matches!(
        store.update_row(TableId::StopTimes, "T1/2", &patch),
        Err(Error::Integrity(_))
    ));
    let patch = record(&[("stop_headsign", "Downtown")]);
    store.update_row(TableId::StopTimes, "T1/2", &patch).unwrap();
    let row = store.get_row(TableId::StopTimes, "T1/2").unwrap().unwrap();
    assert_eq!(row.get("stop_headsign").map(String::as_str), Some("Downtown"));
}

#[test]
fn editing_a_time_reorders_the_trip() {
    init_logs();
    let mut store = fixture_store();
    // B leaves later than C now.
    let patch = record(&[("arrival_time", "08:20:00"), ("departure_time", "08:20:00")]);
    store.update_row(TableId::StopTimes, "T1/2", &patch).unwrap();

    renumber_stop_sequences(&mut store, "T1").unwrap();

    let ordered: Vec<(String, String)> = ["T1/1", "T1/2", "T1/3"]
        .iter()
        .map(|key| {
            let row = store.get_row(TableId::StopTimes, key).unwrap().unwrap();
            (row["stop_id"].clone(), row["departure_time"].clone())
        })
        .collect();
    assert_eq!(
        ordered,
        vec![
            ("A".to_owned(), "08:00:00".to_owned()),
            ("C".to_owned(), "08:10:00".to_owned()),
            ("B".to_owned(), "08:20:00".to_owned()),
        ]
    );
}

/// Counts write calls so no-op renumbering is observable.
struct CountingStore {
    inner: MemoryStore,
    writes: usize,
}

impl RowStore for CountingStore {
    fn get_row(&self, table: TableId, key: &str) -> Result<Option<Record>, Error> {
        self.inner.get_row(table, key)
    }
    fn query_rows(
        &self,
        table: TableId,
        filter: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, Error> {
        self.inner.query_rows(table, filter)
    }
    fn insert_rows(&mut self, table: TableId, rows: Vec<Record>) -> Result<(), Error> {
        self.writes += 1;
        self.inner.insert_rows(table, rows)
    }
    fn delete_row(&mut self, table: TableId, key: &str) -> Result<(), Error> {
        self.writes += 1;
        self.inner.delete_row(table, key)
    }
    fn update_row(&mut self, table: TableId, key: &str, patch: &Record) -> Result<(), Error> {
        self.writes += 1;
        self.inner.update_row(table, key, patch)
    }
}

#[test]
fn renumbering_an_ordered_trip_writes_nothing() {
    let mut store = CountingStore {
        inner: fixture_store(),
        writes: 0,
    };
    renumber_stop_sequences(&mut store, "T1").unwrap();
    assert_eq!(store.writes, 0);
}

#[test]
fn tied_rows_keep_their_relative_order() {
    let mut store = MemoryStore::new();
    store
        .insert_rows(
            TableId::StopTimes,
            vec![
                stop_time("T9", "X", "3", "", ""),
                stop_time("T9", "Y", "5", "", ""),
            ],
        )
        .unwrap();
    renumber_stop_sequences(&mut store, "T9").unwrap();
    let first = store.get_row(TableId::StopTimes, "T9/1").unwrap().unwrap();
    let second = store.get_row(TableId::StopTimes, "T9/2").unwrap().unwrap();
    assert_eq!(first.get("stop_id").map(String::as_str), Some("X"));
    assert_eq!(second.get("stop_id").map(String::as_str), Some("Y"));
}

#[test]
fn untimed_rows_sort_after_timed_ones() {
    let mut store = MemoryStore::new();
    store
        .insert_rows(
            TableId::StopTimes,
            vec![
                stop_time("T9", "NO_TIME", "1", "", ""),
                stop_time("T9", "TIMED", "2", "09:00:00", "09:00:00"),
                // Past-midnight rollover still compares as a fixed-width string.
                stop_time("T9", "LATE", "3", "25:30:00", "25:30:00"),
            ],
        )
        .unwrap();
    renumber_stop_sequences(&mut store, "T9").unwrap();
    let order: Vec<String> = ["T9/1", "T9/2", "T9/3"]
        .iter()
        .map(|key| store.get_row(TableId::StopTimes, key).unwrap().unwrap()["stop_id"].clone())
        .collect();
    assert_eq!(order, vec!["TIMED", "LATE", "NO_TIME"]);
}

#[test]
fn renumbering_requires_identity_fields() {
    let mut store = MemoryStore::new();
    // The codec happily encodes a non-numeric sequence; the renumbering
    // engine is the one that must refuse it, before any write.
    store
        .insert_rows(
            TableId::StopTimes,
            vec![stop_time("T9", "A", "not-a-number", "", "")],
        )
        .unwrap();
    assert!(matches!(
        renumber_stop_sequences(&mut store, "T9"),
        Err(Error::Integrity(_))
    ));
    assert_eq!(store.row_count(TableId::StopTimes), 1);

    assert!(matches!(
        renumber_stop_sequences(&mut store, ""),
        Err(Error::Integrity(_))
    ));
}

/// Fails a configurable number of mutating calls, then behaves normally.
struct FaultyStore {
    inner: MemoryStore,
    failures_left: usize,
    fail_deletes: bool,
}

impl FaultyStore {
    fn trip_snapshot(&self, trip_id: &str) -> Vec<Record> {
        self.inner
            .query_rows(TableId::StopTimes, &|r| {
                r.get("trip_id").map(String::as_str) == Some(trip_id)
            })
            .unwrap()
    }
}

impl RowStore for FaultyStore {
    fn get_row(&self, table: TableId, key: &str) -> Result<Option<Record>, Error> {
        self.inner.get_row(table, key)
    }
    fn query_rows(
        &self,
        table: TableId,
        filter: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, Error> {
        self.inner.query_rows(table, filter)
    }
    fn insert_rows(&mut self, table: TableId, rows: Vec<Record>) -> Result<(), Error> {
        if !self.fail_deletes && self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(Error::Integrity("injected insert failure".to_owned()));
        }
        self.inner.insert_rows(table, rows)
    }
    fn delete_row(&mut self, table: TableId, key: &str) -> Result<(), Error> {
        if self.fail_deletes && self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(Error::Integrity("injected delete failure".to_owned()));
        }
        self.inner.delete_row(table, key)
    }
    fn update_row(&mut self, table: TableId, key: &str, patch: &Record) -> Result<(), Error> {
        self.inner.update_row(table, key, patch)
    }
}

fn scrambled_trip_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .insert_rows(
            TableId::StopTimes,
            vec![
                stop_time("T1", "A", "4", "08:00:00", "08:00:00"),
                stop_time("T1", "B", "7", "08:05:00", "08:05:00"),
            ],
        )
        .unwrap();
    store
}

#[test]
fn failed_reinsert_restores_the_old_rows() {
    init_logs();
    let mut store = FaultyStore {
        inner: scrambled_trip_store(),
        failures_left: 1,
        fail_deletes: false,
    };
    let before = store.trip_snapshot("T1");
    assert!(renumber_stop_sequences(&mut store, "T1").is_err());
    assert_eq!(store.trip_snapshot("T1"), before);
    // The store is intact, so a retry succeeds.
    renumber_stop_sequences(&mut store, "T1").unwrap();
    assert_eq!(store.inner.row_count(TableId::StopTimes), 2);
}

#[test]
fn failed_delete_midway_restores_the_old_rows() {
    let mut store = FaultyStore {
        inner: scrambled_trip_store(),
        failures_left: 1,
        fail_deletes: true,
    };
    let before = store.trip_snapshot("T1");
    // The first delete fails before anything changed.
    assert!(renumber_stop_sequences(&mut store, "T1").is_err());
    assert_eq!(store.trip_snapshot("T1"), before);
}

#[test]
fn alignment_merges_partial_trips() {
    let slots = align_stop_sequences(&[
        vec!["A".to_owned(), "B".to_owned(), "C".to_owned()],
        vec!["A".to_owned(), "C".to_owned()],
    ]);
    assert_eq!(slots, vec!["A", "B", "C"]);
}

#[test]
fn alignment_survives_conflicting_orders() {
    let t1 = vec!["A".to_owned(), "B".to_owned()];
    let t2 = vec!["B".to_owned(), "A".to_owned()];
    let slots = align_stop_sequences(&[t1.clone(), t2.clone()]);
    // Irreconcilable orders cost extra slots but never an error, and every
    // trip still projects onto strictly increasing indices.
    for trip in [&t1, &t2] {
        let indices = slot_indices(&slots, trip);
        assert_eq!(indices.len(), trip.len());
        assert!(indices.windows(2).all(|w| w[0] < w[1]), "{indices:?}");
    }
}

#[test]
fn timetable_grid_leaves_empty_cells_for_skipped_stops() {
    let mut store = fixture_store();
    store
        .insert_rows(
            TableId::Trips,
            vec![record(&[
                ("trip_id", "T2"),
                ("route_id", "R1"),
                ("service_id", "S1"),
                ("direction_id", "0"),
            ])],
        )
        .unwrap();
    store
        .insert_rows(
            TableId::StopTimes,
            vec![
                stop_time("T2", "A", "1", "08:30:00", "08:30:00"),
                stop_time("T2", "C", "2", "08:40:00", "08:40:00"),
            ],
        )
        .unwrap();

    let data = generate_timetable_data(&store, "R1", "S1", None).unwrap();
    let slot_ids: Vec<&str> = data.stops.iter().map(|s| s.stop_id.as_str()).collect();
    assert_eq!(slot_ids, vec!["A", "B", "C"]);
    assert_eq!(data.stops[0].stop_name.as_deref(), Some("Alpha"));

    assert_eq!(data.trips.len(), 2);
    // T1 departs first and owns the full supersequence.
    assert_eq!(data.trips[0].trip_id, "T1");
    assert_eq!(
        data.trips[0].times,
        vec![
            Some("08:00:00".to_owned()),
            Some("08:05:00".to_owned()),
            Some("08:10:00".to_owned()),
        ]
    );
    assert_eq!(data.trips[1].trip_id, "T2");
    assert_eq!(
        data.trips[1].times,
        vec![Some("08:30:00".to_owned()), None, Some("08:40:00".to_owned())]
    );

    let other_direction = generate_timetable_data(&store, "R1", "S1", Some("1")).unwrap();
    assert!(other_direction.trips.is_empty());
}

#[test]
fn rows_without_a_stop_are_left_out_of_the_grid() {
    let mut store = MemoryStore::new();
    store
        .insert_rows(
            TableId::Routes,
            vec![record(&[("route_id", "R1"), ("route_type", "3")])],
        )
        .unwrap();
    store
        .insert_rows(
            TableId::Trips,
            vec![record(&[("trip_id", "T1"), ("route_id", "R1"), ("service_id", "S1")])],
        )
        .unwrap();
    // Only trip_id and stop_sequence form the key, so a row with no stop
    // at all is insertable — here right between two real stops. It must
    // not shift its time into the next stop's cell.
    store
        .insert_rows(
            TableId::StopTimes,
            vec![
                stop_time("T1", "A", "1", "08:00:00", "08:00:00"),
                record(&[
                    ("trip_id", "T1"),
                    ("stop_sequence", "2"),
                    ("departure_time", "23:59:00"),
                ]),
                stop_time("T1", "C", "3", "08:10:00", "08:10:00"),
            ],
        )
        .unwrap();

    let data = generate_timetable_data(&store, "R1", "S1", None).unwrap();
    let slot_ids: Vec<&str> = data.stops.iter().map(|s| s.stop_id.as_str()).collect();
    assert_eq!(slot_ids, vec!["A", "C"]);
    assert_eq!(
        data.trips[0].times,
        vec![Some("08:00:00".to_owned()), Some("08:10:00".to_owned())]
    );
}

#[test]
fn timetable_data_serializes_for_the_ui() {
    let store = fixture_store();
    let data = generate_timetable_data(&store, "R1", "S1", None).unwrap();
    let json = serde_json::to_string(&data).unwrap();
    assert!(json.contains("\"stop_id\":\"A\""));

    let result = validate_table(
        TableId::StopTimes,
        &[stop_time("T1", "A", "1", "bad", "")],
        &ValidationOptions::default(),
    );
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"bad_type\""));
}
