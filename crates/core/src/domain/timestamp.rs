//! Timestamp parsing, storage formatting, and calendar-day windows.

use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    SubsecRound, TimeZone, Utc,
};

use crate::errors::DomainError;

const LOCAL_FORMATS: [&str; 4] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

// Largest wall-clock jump (in minutes) searched when a local time falls into a DST gap.
const MAX_GAP_MINUTES: i64 = 180;

/// Current time at storage precision.
pub fn now_utc() -> DateTime<Utc> {
    storage_precision(Utc::now())
}

/// Drops sub-microsecond digits so a value survives a store round trip unchanged.
pub fn storage_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(6)
}

/// Stored form: UTC, RFC 3339, fixed microsecond precision. Lexical order of
/// the stored text equals chronological order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|value| value.with_timezone(&Utc))
}

/// Parses user input, interpreting zone-less values in server local time.
pub fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, DomainError> {
    parse_timestamp_in(field, raw, &Local)
}

/// Accepts RFC 3339, `datetime-local` style values (`2024-05-01T09:30`), and
/// bare dates, which resolve to midnight in `tz`.
pub fn parse_timestamp_in<Tz: TimeZone>(
    field: &'static str,
    raw: &str,
    tz: &Tz,
) -> Result<DateTime<Utc>, DomainError> {
    let value = raw.trim();
    let invalid = || DomainError::InvalidTimestamp { field, value: value.to_string() };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(invalid)?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(resolved) => Ok(resolved.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(invalid()),
    }
}

/// Inclusive UTC window covering the local calendar day of `now`: local
/// midnight through 23:59:59.999999.
pub fn day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let start_naive = now.date_naive().and_time(NaiveTime::MIN);
    let end_naive = start_naive + Duration::days(1) - Duration::microseconds(1);

    (resolve_day_edge(&tz, start_naive, Edge::Start), resolve_day_edge(&tz, end_naive, Edge::End))
}

#[derive(Clone, Copy)]
enum Edge {
    Start,
    End,
}

fn resolve_day_edge<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, edge: Edge) -> DateTime<Utc> {
    let step = match edge {
        Edge::Start => Duration::minutes(1),
        Edge::End => -Duration::minutes(1),
    };

    let mut candidate = naive;
    for _ in 0..=MAX_GAP_MINUTES {
        match (tz.from_local_datetime(&candidate), edge) {
            (LocalResult::Single(resolved), _) => return resolved.with_timezone(&Utc),
            (LocalResult::Ambiguous(earliest, _), Edge::Start) => {
                return earliest.with_timezone(&Utc)
            }
            (LocalResult::Ambiguous(_, latest), Edge::End) => return latest.with_timezone(&Utc),
            (LocalResult::None, _) => candidate += step,
        }
    }

    Utc.from_utc_datetime(&naive)
}
