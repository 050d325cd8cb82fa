//! The schema registry: one hand-authored descriptor per table.
//!
//! Everything the rest of the crate knows about a table — its field
//! identifiers, their type tags, which fields are required, which fields
//! reference other tables and how the record's identity key is shaped —
//! comes from the [TableSchema] values in this module. There is no runtime
//! reflection; the descriptor tables below are the single source of truth.

use crate::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// All the tables of a feed that this crate edits
#[derive(Debug, Serialize, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TableId {
    /// Operators running the network
    Agency,
    /// Physical stops, stations and station entrances
    Stops,
    /// Commercial lines
    Routes,
    /// One vehicle run over a route on certain days
    Trips,
    /// The moments where a trip's vehicle calls at a stop
    StopTimes,
    /// Weekly service patterns, identified by `service_id`
    Calendar,
    /// Day-level additions and removals against a service pattern
    CalendarDates,
    /// Geographic polylines followed by trips
    Shapes,
    /// Fare pricing rules
    FareAttributes,
    /// Headway-based timetables
    Frequencies,
    /// Metadata about the feed itself; at most one row
    FeedInfo,
}

impl TableId {
    /// Every supported table, in feed-file order
    pub const ALL: [TableId; 11] = [
        TableId::Agency,
        TableId::Stops,
        TableId::Routes,
        TableId::Trips,
        TableId::StopTimes,
        TableId::Calendar,
        TableId::CalendarDates,
        TableId::Shapes,
        TableId::FareAttributes,
        TableId::Frequencies,
        TableId::FeedInfo,
    ];

    /// The table's file-stem identifier (`stop_times` for `stop_times.txt`)
    pub fn as_str(self) -> &'static str {
        match self {
            TableId::Agency => "agency",
            TableId::Stops => "stops",
            TableId::Routes => "routes",
            TableId::Trips => "trips",
            TableId::StopTimes => "stop_times",
            TableId::Calendar => "calendar",
            TableId::CalendarDates => "calendar_dates",
            TableId::Shapes => "shapes",
            TableId::FareAttributes => "fare_attributes",
            TableId::Frequencies => "frequencies",
            TableId::FeedInfo => "feed_info",
        }
    }
}

impl FromStr for TableId {
    type Err = Error;

    fn from_str(s: &str) -> Result<TableId, Error> {
        TableId::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownTable(s.to_owned()))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag attached to a field, driving parsing, display and validation
#[derive(Debug, Serialize, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free text, no constraint beyond being a string
    Text,
    /// Six hex digits without separator or leading `#`
    Color,
    /// A calendar date, canonically `YYYYMMDD`
    Date,
    /// A clock time `HH:MM:SS`; the hour may exceed 23 to roll past midnight
    Time,
    /// Degrees latitude in `[-90, 90]`, canonically six decimals
    Latitude,
    /// Degrees longitude in `[-180, 180]`, canonically six decimals
    Longitude,
    /// A non-negative monetary amount, canonically two decimals
    Currency,
    /// A non-negative decimal, e.g. a distance along a shape
    Float,
    /// A signed integer
    Integer,
    /// An unsigned integer
    NonNegativeInteger,
    /// One value out of a closed set
    Enumeration(&'static [&'static str]),
}

/// Descriptor of a single field within a table
#[derive(Debug, Serialize, Copy, Clone)]
pub struct FieldSpec {
    /// Field identifier, identical to the feed-file column header
    pub name: &'static str,
    /// Type tag consumed by the field type layer
    pub field_type: FieldType,
    /// Whether a row without this field (or with it empty) is rejected
    pub required: bool,
    /// Table whose identity this field's value must resolve against, if any
    pub references: Option<TableId>,
}

/// How a table's identity key is formed from its fields
#[derive(Debug, Serialize, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum KeyConfig {
    /// A single field carries the whole identity
    Natural(&'static str),
    /// Several fields joined in declared order form the identity
    Composite(&'static [&'static str]),
    /// No field subset identifies a row; every field participates
    AllFields,
    /// The table holds at most one row, identified by a fixed constant key
    SingleRow,
}

/// Complete description of one table
#[derive(Debug, Serialize, Copy, Clone)]
pub struct TableSchema {
    /// The table being described
    pub table: TableId,
    /// Field descriptors, in feed-file column order
    pub fields: &'static [FieldSpec],
    /// Identity-key shape
    pub key: KeyConfig,
}

impl TableSchema {
    /// Looks a field up by identifier
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if `name` participates in the identity key.
    ///
    /// Under [KeyConfig::AllFields] every declared field is key-forming;
    /// under [KeyConfig::SingleRow] none is.
    pub fn is_key_field(&self, name: &str) -> bool {
        match self.key {
            KeyConfig::Natural(f) => f == name,
            KeyConfig::Composite(fs) => fs.contains(&name),
            KeyConfig::AllFields => self.field(name).is_some(),
            KeyConfig::SingleRow => false,
        }
    }
}

const fn field(name: &'static str, field_type: FieldType, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required,
        references: None,
    }
}

const fn reference(name: &'static str, target: TableId, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Text,
        required,
        references: Some(target),
    }
}

const ZERO_ONE: &[&str] = &["0", "1"];
const ZERO_ONE_TWO: &[&str] = &["0", "1", "2"];
const ROUTE_TYPES: &[&str] = &["0", "1", "2", "3", "4", "5", "6", "7"];
const PICKUP_TYPES: &[&str] = &["0", "1", "2", "3"];
const EXCEPTION_TYPES: &[&str] = &["1", "2"];

static AGENCY: TableSchema = TableSchema {
    table: TableId::Agency,
    key: KeyConfig::Natural("agency_id"),
    fields: &[
        field("agency_id", FieldType::Text, true),
        field("agency_name", FieldType::Text, true),
        field("agency_url", FieldType::Text, true),
        field("agency_timezone", FieldType::Text, true),
        field("agency_lang", FieldType::Text, false),
        field("agency_phone", FieldType::Text, false),
        field("agency_fare_url", FieldType::Text, false),
        field("agency_email", FieldType::Text, false),
    ],
};

static STOPS: TableSchema = TableSchema {
    table: TableId::Stops,
    key: KeyConfig::Natural("stop_id"),
    fields: &[
        field("stop_id", FieldType::Text, true),
        field("stop_code", FieldType::Text, false),
        field("stop_name", FieldType::Text, true),
        field("stop_desc", FieldType::Text, false),
        field("stop_lat", FieldType::Latitude, true),
        field("stop_lon", FieldType::Longitude, true),
        field("zone_id", FieldType::Text, false),
        field("stop_url", FieldType::Text, false),
        field("location_type", FieldType::Enumeration(&["0", "1", "2", "3", "4"]), false),
        reference("parent_station", TableId::Stops, false),
        field("stop_timezone", FieldType::Text, false),
        field("wheelchair_boarding", FieldType::Enumeration(ZERO_ONE_TWO), false),
    ],
};

static ROUTES: TableSchema = TableSchema {
    table: TableId::Routes,
    key: KeyConfig::Natural("route_id"),
    fields: &[
        field("route_id", FieldType::Text, true),
        reference("agency_id", TableId::Agency, false),
        field("route_short_name", FieldType::Text, false),
        field("route_long_name", FieldType::Text, false),
        field("route_desc", FieldType::Text, false),
        field("route_type", FieldType::Enumeration(ROUTE_TYPES), true),
        field("route_url", FieldType::Text, false),
        field("route_color", FieldType::Color, false),
        field("route_text_color", FieldType::Color, false),
        field("route_sort_order", FieldType::NonNegativeInteger, false),
    ],
};

static TRIPS: TableSchema = TableSchema {
    table: TableId::Trips,
    key: KeyConfig::Natural("trip_id"),
    fields: &[
        field("trip_id", FieldType::Text, true),
        reference("route_id", TableId::Routes, true),
        reference("service_id", TableId::Calendar, true),
        field("trip_headsign", FieldType::Text, false),
        field("trip_short_name", FieldType::Text, false),
        field("direction_id", FieldType::Enumeration(ZERO_ONE), false),
        field("block_id", FieldType::Text, false),
        // Shapes have a composite identity, so a bare shape_id cannot be
        // checked against the shapes index; it stays an undeclared reference.
        field("shape_id", FieldType::Text, false),
        field("wheelchair_accessible", FieldType::Enumeration(ZERO_ONE_TWO), false),
        field("bikes_allowed", FieldType::Enumeration(ZERO_ONE_TWO), false),
    ],
};

static STOP_TIMES: TableSchema = TableSchema {
    table: TableId::StopTimes,
    key: KeyConfig::Composite(&["trip_id", "stop_sequence"]),
    fields: &[
        reference("trip_id", TableId::Trips, true),
        field("arrival_time", FieldType::Time, false),
        field("departure_time", FieldType::Time, false),
        reference("stop_id", TableId::Stops, true),
        field("stop_sequence", FieldType::NonNegativeInteger, true),
        field("stop_headsign", FieldType::Text, false),
        field("pickup_type", FieldType::Enumeration(PICKUP_TYPES), false),
        field("drop_off_type", FieldType::Enumeration(PICKUP_TYPES), false),
        field("shape_dist_traveled", FieldType::Float, false),
        field("timepoint", FieldType::Enumeration(ZERO_ONE), false),
    ],
};

static CALENDAR: TableSchema = TableSchema {
    table: TableId::Calendar,
    key: KeyConfig::Natural("service_id"),
    fields: &[
        field("service_id", FieldType::Text, true),
        field("monday", FieldType::Enumeration(ZERO_ONE), true),
        field("tuesday", FieldType::Enumeration(ZERO_ONE), true),
        field("wednesday", FieldType::Enumeration(ZERO_ONE), true),
        field("thursday", FieldType::Enumeration(ZERO_ONE), true),
        field("friday", FieldType::Enumeration(ZERO_ONE), true),
        field("saturday", FieldType::Enumeration(ZERO_ONE), true),
        field("sunday", FieldType::Enumeration(ZERO_ONE), true),
        field("start_date", FieldType::Date, true),
        field("end_date", FieldType::Date, true),
    ],
};

static CALENDAR_DATES: TableSchema = TableSchema {
    table: TableId::CalendarDates,
    key: KeyConfig::Composite(&["service_id", "date"]),
    fields: &[
        field("service_id", FieldType::Text, true),
        field("date", FieldType::Date, true),
        field("exception_type", FieldType::Enumeration(EXCEPTION_TYPES), true),
    ],
};

static SHAPES: TableSchema = TableSchema {
    table: TableId::Shapes,
    key: KeyConfig::Composite(&["shape_id", "shape_pt_sequence"]),
    fields: &[
        field("shape_id", FieldType::Text, true),
        field("shape_pt_lat", FieldType::Latitude, true),
        field("shape_pt_lon", FieldType::Longitude, true),
        field("shape_pt_sequence", FieldType::NonNegativeInteger, true),
        field("shape_dist_traveled", FieldType::Float, false),
    ],
};

static FARE_ATTRIBUTES: TableSchema = TableSchema {
    table: TableId::FareAttributes,
    key: KeyConfig::Natural("fare_id"),
    fields: &[
        field("fare_id", FieldType::Text, true),
        field("price", FieldType::Currency, true),
        field("currency_type", FieldType::Text, true),
        field("payment_method", FieldType::Enumeration(ZERO_ONE), true),
        field("transfers", FieldType::Enumeration(ZERO_ONE_TWO), false),
        reference("agency_id", TableId::Agency, false),
        field("transfer_duration", FieldType::NonNegativeInteger, false),
    ],
};

static FREQUENCIES: TableSchema = TableSchema {
    table: TableId::Frequencies,
    key: KeyConfig::AllFields,
    fields: &[
        reference("trip_id", TableId::Trips, true),
        field("start_time", FieldType::Time, true),
        field("end_time", FieldType::Time, true),
        field("headway_secs", FieldType::NonNegativeInteger, true),
        field("exact_times", FieldType::Enumeration(ZERO_ONE), false),
    ],
};

static FEED_INFO: TableSchema = TableSchema {
    table: TableId::FeedInfo,
    key: KeyConfig::SingleRow,
    fields: &[
        field("feed_publisher_name", FieldType::Text, true),
        field("feed_publisher_url", FieldType::Text, true),
        field("feed_lang", FieldType::Text, true),
        field("default_lang", FieldType::Text, false),
        field("feed_start_date", FieldType::Date, false),
        field("feed_end_date", FieldType::Date, false),
        field("feed_version", FieldType::Text, false),
        field("feed_contact_email", FieldType::Text, false),
        field("feed_contact_url", FieldType::Text, false),
    ],
};

/// Returns the descriptor of `table`.
///
/// Total over [TableId]; resolving an arbitrary string to a table goes
/// through `TableId::from_str`, which is where `UnknownTable` arises.
pub fn describe(table: TableId) -> &'static TableSchema {
    match table {
        TableId::Agency => &AGENCY,
        TableId::Stops => &STOPS,
        TableId::Routes => &ROUTES,
        TableId::Trips => &TRIPS,
        TableId::StopTimes => &STOP_TIMES,
        TableId::Calendar => &CALENDAR,
        TableId::CalendarDates => &CALENDAR_DATES,
        TableId::Shapes => &SHAPES,
        TableId::FareAttributes => &FARE_ATTRIBUTES,
        TableId::Frequencies => &FREQUENCIES,
        TableId::FeedInfo => &FEED_INFO,
    }
}
