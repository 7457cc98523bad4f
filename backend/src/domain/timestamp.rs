//! Timestamp normalization and staleness comparison.
//!
//! Field devices send `updated_at` as RFC 3339 strings; records persisted
//! through the store come back with server-assigned timestamps that may be
//! serialised as epoch milliseconds or as `{_seconds, _nanoseconds}`
//! objects. Everything is normalized to a single comparable instant here.
//!
//! A missing or unparseable timestamp is treated as "equal to now" for
//! staleness purposes, so a client that cannot say when it wrote is allowed
//! to win by default. This is a public contract; callers relying on
//! strict-reject semantics must validate the field up front.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Convert a JSON timestamp representation into a comparable instant.
///
/// Accepts RFC 3339 strings, plain `YYYY-MM-DD` dates, integer epoch
/// milliseconds, and `{_seconds, _nanoseconds}` server-timestamp objects.
/// Returns `None` for null, absent, or unparseable values.
pub fn to_instant(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(raw) => parse_string(raw),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Object(obj) => {
            let seconds = obj.get("_seconds").or_else(|| obj.get("seconds"))?.as_i64()?;
            let nanos = obj
                .get("_nanoseconds")
                .or_else(|| obj.get("nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos.clamp(0, 999_999_999) as u32)
                .single()
        }
        _ => None,
    }
}

fn parse_string(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Read a document field as an instant.
pub fn field_instant(doc: &crate::domain::Document, field: &str) -> Option<DateTime<Utc>> {
    to_instant(doc.get(field))
}

/// Resolve an optional instant for staleness comparison: unknown is "now".
pub fn instant_or_now(instant: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    instant.unwrap_or(now)
}

/// Render an instant in the canonical wire format.
pub fn to_value(instant: DateTime<Utc>) -> Value {
    Value::String(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}
