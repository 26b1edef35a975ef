//! Tick Arithmetic and Report Formatting
//!
//! Sample values are derived from 100-ns ticks counted from
//! 0001-01-01T00:00:00 (proleptic Gregorian). Everything here is exact integer
//! math on `i128`; binary floats never touch a sample value.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::time::Duration;

/// Exact sample value: milliseconds since 0001-01-01T00:00:00.
/// i128 carries 38 significant decimal digits, so sums over a full cycle
/// (~10^19 for the default workload) stay exact.
pub type SampleValue = i128;

/// Conversion constants
pub const NANOS_PER_TICK: i128 = 100;
pub const TICKS_PER_MILLI: i128 = 10_000;
pub const TICKS_PER_SEC: i128 = 10_000_000;

/// Seconds between 0001-01-01T00:00:00 and the Unix epoch.
pub const EPOCH_OFFSET_SECS: i128 = 62_135_596_800;

/// Format used for timestamps on the command line and in log lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Start of every generated sequence unless overridden: 1990-01-01T01:01:01.001.
pub fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1990, 1, 1)
        .and_then(|d| d.and_hms_milli_opt(1, 1, 1, 1))
        .expect("static calendar date")
}

/// Step between consecutive samples unless overridden.
pub fn default_interval() -> TimeDelta {
    TimeDelta::minutes(5)
}

/// Count of 100-ns ticks since 0001-01-01T00:00:00.
#[inline]
pub fn ticks(timestamp: NaiveDateTime) -> i128 {
    let utc = timestamp.and_utc();
    let secs = utc.timestamp() as i128 + EPOCH_OFFSET_SECS;
    let sub_ticks = utc.timestamp_subsec_nanos() as i128 / NANOS_PER_TICK;
    secs * TICKS_PER_SEC + sub_ticks
}

/// `floor(ticks / 10_000)`, i.e. whole milliseconds since the tick epoch.
#[inline]
pub fn value_from_ticks(ticks: i128) -> SampleValue {
    ticks.div_euclid(TICKS_PER_MILLI)
}

/// Value a sample loaded at `timestamp` carries.
#[inline]
pub fn value_at(timestamp: NaiveDateTime) -> SampleValue {
    value_from_ticks(ticks(timestamp))
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Thousands-separated integer, e.g. `13,955,560,624,647,864,222`.
pub fn format_grouped(value: i128) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Elapsed milliseconds, grouped, rounded to two decimals: `1,234.57`.
pub fn format_millis(elapsed: Duration) -> String {
    let hundredths = (elapsed.as_nanos() + 5_000) / 10_000;
    format!(
        "{}.{:02}",
        format_grouped((hundredths / 100) as i128),
        hundredths % 100
    )
}

/// Elapsed milliseconds as a float, for JSON reports only.
pub fn duration_millis(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}
