//! Per-type parsing, formatting and validation of raw field values.
//!
//! Every typed cell in the feed passes through here twice: once on the way
//! in (`to_canonical`, producing the form stored and compared everywhere
//! else) and once on the way out (`to_display`, producing what an editing
//! surface shows). `validate` explains failures without ever panicking.

use crate::schema::FieldType;
use chrono::NaiveDate;
use rgb::RGB8;
use serde::Serialize;

/// Outcome of checking one raw value against a type tag
#[derive(Debug, Serialize, Clone)]
pub struct FieldCheck {
    /// Whether the value conforms to the type
    pub is_valid: bool,
    /// Human-readable reason when it does not
    pub reason: Option<String>,
}

impl FieldCheck {
    fn ok() -> FieldCheck {
        FieldCheck {
            is_valid: true,
            reason: None,
        }
    }

    fn invalid(reason: String) -> FieldCheck {
        FieldCheck {
            is_valid: false,
            reason: Some(reason),
        }
    }
}

/// Parses a clock time into seconds since the service day's midnight.
///
/// Hours are unbounded above 23 so that times past midnight stay attached
/// to the day the trip started on (`25:10:00` is 01:10 the next morning).
/// Minutes and seconds must be two digits in `[0, 59]`.
pub fn parse_time(s: &str) -> Result<u32, String> {
    let mut parts = s.split(':');
    let (h, m, sec) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(sec), None) => (h, m, sec),
        _ => {
            return Err(format!(
                "'{s}' is not a valid time; HH:MM:SS format is expected"
            ))
        }
    };
    if h.is_empty() || m.len() != 2 || sec.len() != 2 {
        return Err(format!(
            "'{s}' is not a valid time; HH:MM:SS format is expected"
        ));
    }
    let hours: u32 = h
        .parse()
        .map_err(|_| format!("'{s}' is not a valid time; the hour is not a number"))?;
    let minutes: u32 = m
        .parse()
        .map_err(|_| format!("'{s}' is not a valid time; the minute is not a number"))?;
    let seconds: u32 = sec
        .parse()
        .map_err(|_| format!("'{s}' is not a valid time; the second is not a number"))?;
    if minutes > 59 || seconds > 59 {
        return Err(format!(
            "'{s}' is not a valid time; minutes and seconds must be within [0, 59]"
        ));
    }
    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Formats seconds-since-midnight as zero-padded `HH:MM:SS`
pub fn format_time(time: u32) -> String {
    format!("{:02}:{:02}:{:02}", time / 3600, time % 3600 / 60, time % 60)
}

/// Parses a `RRGGBB` color, tolerating a leading `#`
pub fn parse_color(s: &str) -> Result<RGB8, String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 {
        return Err(format!(
            "'{s}' is not a valid color; RRGGBB format is expected, without a leading `#`"
        ));
    }
    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| {
            format!("'{s}' is not a valid color; RRGGBB format is expected, without a leading `#`")
        })
    };
    Ok(RGB8::new(component(0..2)?, component(2..4)?, component(4..6)?))
}

/// Formats a color in its canonical `RRGGBB` form
pub fn format_color(color: RGB8) -> String {
    format!("{:02X}{:02X}{:02X}", color.r, color.g, color.b)
}

/// Parses a calendar date, accepting canonical `YYYYMMDD` or displayed `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| format!("'{s}' is not a valid date; YYYYMMDD format is expected"))
}

/// Formats a date in its canonical `YYYYMMDD` form
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn parse_coordinate(s: &str, limit: f64, axis: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a valid {axis}; a decimal number is expected"))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(format!(
            "'{s}' is out of range for a {axis}; expected [-{limit}, {limit}]"
        ));
    }
    Ok(value)
}

fn parse_non_negative(s: &str, what: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a valid {what}; a decimal number is expected"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("'{s}' is not a valid {what}; it must not be negative"));
    }
    Ok(value)
}

impl FieldType {
    /// Checks a raw value against this type. Never panics; a failure comes
    /// back as a flag plus a reason.
    pub fn validate(&self, raw: &str) -> FieldCheck {
        let result: Result<(), String> = match self {
            FieldType::Text => Ok(()),
            FieldType::Color => parse_color(raw).map(|_| ()),
            FieldType::Date => parse_date(raw).map(|_| ()),
            FieldType::Time => parse_time(raw).map(|_| ()),
            FieldType::Latitude => parse_coordinate(raw, 90.0, "latitude").map(|_| ()),
            FieldType::Longitude => parse_coordinate(raw, 180.0, "longitude").map(|_| ()),
            FieldType::Currency => parse_non_negative(raw, "amount").map(|_| ()),
            FieldType::Float => parse_non_negative(raw, "decimal").map(|_| ()),
            FieldType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("'{raw}' is not a valid integer")),
            FieldType::NonNegativeInteger => raw
                .trim()
                .parse::<u64>()
                .map(|_| ())
                .map_err(|_| format!("'{raw}' is not a valid non-negative integer")),
            FieldType::Enumeration(options) => {
                if options.contains(&raw.trim()) {
                    Ok(())
                } else {
                    Err(format!(
                        "'{raw}' is not one of the allowed values ({})",
                        options.join(", ")
                    ))
                }
            }
        };
        match result {
            Ok(()) => FieldCheck::ok(),
            Err(reason) => FieldCheck::invalid(reason),
        }
    }

    /// Converts a raw value into its canonical stored form, or `None` when
    /// the value does not parse under this type.
    ///
    /// Canonicalizing a displayed value yields the same canonical form again,
    /// so a display/canonicalize round trip is idempotent.
    pub fn to_canonical(&self, raw: &str) -> Option<String> {
        match self {
            FieldType::Text => Some(raw.trim().to_owned()),
            FieldType::Color => parse_color(raw).ok().map(format_color),
            FieldType::Date => parse_date(raw).ok().map(format_date),
            FieldType::Time => parse_time(raw).ok().map(format_time),
            FieldType::Latitude => parse_coordinate(raw, 90.0, "latitude")
                .ok()
                .map(|v| format!("{v:.6}")),
            FieldType::Longitude => parse_coordinate(raw, 180.0, "longitude")
                .ok()
                .map(|v| format!("{v:.6}")),
            FieldType::Currency => parse_non_negative(raw, "amount")
                .ok()
                .map(|v| format!("{v:.2}")),
            FieldType::Float => parse_non_negative(raw, "decimal")
                .ok()
                .map(|v| v.to_string()),
            FieldType::Integer => raw.trim().parse::<i64>().ok().map(|v| v.to_string()),
            FieldType::NonNegativeInteger => {
                raw.trim().parse::<u64>().ok().map(|v| v.to_string())
            }
            FieldType::Enumeration(options) => {
                let trimmed = raw.trim();
                options.contains(&trimmed).then(|| trimmed.to_owned())
            }
        }
    }

    /// Renders a canonical value for an editing surface.
    ///
    /// Total: a value that does not parse is returned unchanged so broken
    /// data stays visible rather than vanishing from the grid.
    pub fn to_display(&self, canonical: &str) -> String {
        match self {
            FieldType::Color => match parse_color(canonical) {
                Ok(c) => format!("#{}", format_color(c)),
                Err(_) => canonical.to_owned(),
            },
            FieldType::Date => match parse_date(canonical) {
                Ok(d) => d.format("%Y-%m-%d").to_string(),
                Err(_) => canonical.to_owned(),
            },
            _ => canonical.to_owned(),
        }
    }
}

#[test]
fn test_rollover_time() {
    assert_eq!(parse_time("25:10:00"), Ok(25 * 3600 + 10 * 60));
    assert_eq!(format_time(25 * 3600 + 10 * 60), "25:10:00");
    assert!(parse_time("08:61:00").is_err());
    assert!(parse_time("8:00").is_err());
    assert_eq!(FieldType::Time.to_canonical("8:05:00").unwrap(), "08:05:00");
}

#[test]
fn test_display_canonical_round_trip() {
    for (ft, raw) in [
        (FieldType::Color, "ff0000"),
        (FieldType::Date, "20240101"),
        (FieldType::Time, "9:05:00"),
        (FieldType::Latitude, "45.5"),
        (FieldType::Currency, "3.5"),
    ] {
        let canonical = ft.to_canonical(raw).unwrap();
        let displayed = ft.to_display(&canonical);
        assert_eq!(ft.to_canonical(&displayed).unwrap(), canonical);
    }
}
