//! UTC day and hour windows.
//!
//! Day windows are identified by their calendar date, hour windows by the
//! instant they start. Both have a stable text form used in the database:
//! `YYYY-MM-DD` and `YYYY-MM-DDTHH`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::time::Duration;

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";
const HOUR_KEY_FORMAT: &str = "%Y-%m-%dT%H";
const SECONDS_PER_HOUR: i64 = 3600;

/// Date of the daily window containing `now`.
#[must_use]
pub fn day_key(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Start of the hourly window containing `now`.
#[must_use]
pub fn hour_key(now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = now.timestamp();
    let floored = secs - secs.rem_euclid(SECONDS_PER_HOUR);
    DateTime::from_timestamp(floored, 0).unwrap_or(now)
}

/// Instant the day after `day` begins.
#[must_use]
pub fn next_day_start(day: NaiveDate) -> DateTime<Utc> {
    day.succ_opt()
        .map_or(DateTime::<Utc>::MAX_UTC, |next| next.and_time(NaiveTime::MIN).and_utc())
}

/// Instant the hour after the one starting at `hour` begins.
#[must_use]
pub fn next_hour_start(hour: DateTime<Utc>) -> DateTime<Utc> {
    add_duration(hour, Duration::from_secs(3600))
}

/// Text form of a day key.
#[must_use]
pub fn format_day_key(day: NaiveDate) -> String {
    day.format(DAY_KEY_FORMAT).to_string()
}

/// Text form of an hour key.
#[must_use]
pub fn format_hour_key(hour: DateTime<Utc>) -> String {
    hour.format(HOUR_KEY_FORMAT).to_string()
}

/// Parse the text form of a day key.
pub fn parse_day_key(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, DAY_KEY_FORMAT)
}

/// Parse the text form of an hour key.
pub fn parse_hour_key(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    // chrono needs a minute to build a time of day
    NaiveDateTime::parse_from_str(&format!("{s}:00"), &format!("{HOUR_KEY_FORMAT}:%M"))
        .map(|naive| naive.and_utc())
}

/// `time + duration`, saturating at the largest representable instant.
#[must_use]
pub fn add_duration(time: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Time from `now` until `later`, zero if `later` has passed.
#[must_use]
pub fn duration_until(now: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
    later.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO)
}
