//! Object names for managed copies.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Substitute for empty network, station or channel codes.
pub const PLACEHOLDER_CODE: &str = "XX";

fn code(value: &str) -> &str {
    if value.is_empty() {
        PLACEHOLDER_CODE
    } else {
        value
    }
}

/// `{event}/{NET}.{STA}.{LOC}.{CHA}-{year}_{month}_{day}_{hour}`
pub fn waveform_object_name(
    event: &str,
    network: &str,
    station: &str,
    location: &str,
    channel: &str,
    starttime: DateTime<Utc>,
) -> String {
    format!(
        "{}/{}.{}.{}.{}-{}_{}_{}_{}",
        event,
        code(network),
        code(station),
        location,
        code(channel),
        starttime.year(),
        starttime.month(),
        starttime.day(),
        starttime.hour()
    )
}

/// `{NET}/{NET}.{STA}.{LOC}.{CHA}-{year}_{month}`, `XX` for an unknown
/// start date.
pub fn station_object_name(
    network: &str,
    station: &str,
    location: &str,
    channel: &str,
    start_date: Option<DateTime<Utc>>,
) -> String {
    let period = match start_date {
        Some(date) => format!("{}_{}", date.year(), date.month()),
        None => format!("{}_{}", PLACEHOLDER_CODE, PLACEHOLDER_CODE),
    };
    format!(
        "{net}/{net}.{}.{}.{}-{}",
        code(station),
        location,
        code(channel),
        period,
        net = code(network)
    )
}
