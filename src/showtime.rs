use chrono::{DateTime, Datelike, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

/// Raised when a listing's start-time value cannot be resolved to an instant.
/// Callers drop the offending row; the error never aborts a run.
#[derive(Debug, thiserror::Error)]
#[error("unparseable showtime value: {raw}")]
pub struct TimeParseError {
    pub raw: String,
}

/// Naive formats seen in listing dumps, tried in order after the
/// offset-aware parses. Naive hits are interpreted in the venue timezone.
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Resolve a raw feed value (epoch number or timestamp string) to UTC.
///
/// Naive strings never consult the host timezone: ambiguity is settled by
/// `fallback_tz`, which the caller sets to the venue's zone.
pub fn resolve_instant(raw: &Value, fallback_tz: Tz) -> Result<DateTime<Utc>, TimeParseError> {
    match raw {
        Value::Number(num) => {
            let secs = num
                .as_i64()
                .or_else(|| num.as_f64().map(|f| f.trunc() as i64))
                .ok_or_else(|| err_for(raw))?;
            Utc.timestamp_opt(secs, 0).single().ok_or_else(|| err_for(raw))
        }
        Value::String(text) => resolve_text(text, fallback_tz).ok_or_else(|| err_for(raw)),
        _ => Err(err_for(raw)),
    }
}

fn resolve_text(text: &str, fallback_tz: Tz) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Normalize a trailing Z so the %z attempt accepts it too.
    let normalized = match trimmed.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{head}+00:00"),
        None => trimmed.to_string(),
    };

    if let Ok(parsed) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }

    for fmt in NAIVE_FORMATS.iter() {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return localize(naive, fallback_tz).map(|dt| dt.with_timezone(&Utc));
        }
    }

    None
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(dt, _) => Some(dt),
        LocalResult::None => None,
    }
}

fn err_for(raw: &Value) -> TimeParseError {
    TimeParseError { raw: raw.to_string() }
}

/// Venue-local display label for a showtime, e.g. `Fri • Jan 17 • 7:30 AM`.
pub fn format_showtime(instant: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    format!(
        "{} {} • {}",
        local.format("%a • %b"),
        local.day(),
        clock_label(&local)
    )
}

/// Venue-local refresh label used on the fallback payload.
pub fn format_updated(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format("Updated %b %d • %I:%M %p")
        .to_string()
}

/// 12h clock without a leading zero ('12' keeps both digits).
fn clock_label(local: &DateTime<Tz>) -> String {
    let token = local.format("%I:%M %p").to_string();
    match token.strip_prefix('0') {
        Some(rest) => rest.to_string(),
        None => token,
    }
}

/// Look up an IANA zone name, warning and falling back to UTC when the name
/// is unknown rather than failing the run.
pub fn parse_tz(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("unknown timezone '{name}'; falling back to UTC");
            chrono_tz::UTC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LA: Tz = chrono_tz::America::Los_Angeles;

    fn resolved(raw: Value) -> String {
        resolve_instant(&raw, LA)
            .expect("resolvable showtime")
            .to_rfc3339()
    }

    #[test]
    fn resolves_known_formats() {
        let table = [
            (json!("2025-01-17T15:30:00Z"), "2025-01-17T15:30:00+00:00"),
            (json!("2025-01-17T15:30:00+00:00"), "2025-01-17T15:30:00+00:00"),
            (json!("2025-01-17T07:30:00-08:00"), "2025-01-17T15:30:00+00:00"),
            // Naive strings resolve in the venue zone (PST here), not UTC.
            (json!("2025-01-17T07:30:00"), "2025-01-17T15:30:00+00:00"),
            (json!("2025-01-17 07:30"), "2025-01-17T15:30:00+00:00"),
            (json!("2025-06-10 19:30:00"), "2025-06-11T02:30:00+00:00"),
            (json!(1_737_127_800), "2025-01-17T15:30:00+00:00"),
            (json!(1_737_127_800.5), "2025-01-17T15:30:00+00:00"),
        ];
        for (raw, expected) in table {
            assert_eq!(resolved(raw.clone()), expected, "raw value {raw}");
        }
    }

    #[test]
    fn rejects_garbage() {
        for raw in [json!("next tuesday-ish"), json!(""), json!(null), json!(["7pm"])] {
            assert!(resolve_instant(&raw, LA).is_err(), "raw value {raw}");
        }
    }

    #[test]
    fn ambiguous_fall_back_takes_earlier_instant() {
        // 2025-11-02 01:30 happens twice in Los_Angeles; earlier one is PDT.
        let when = resolved(json!("2025-11-02T01:30:00"));
        assert_eq!(when, "2025-11-02T08:30:00+00:00");
    }

    #[test]
    fn spring_forward_gap_is_unparseable() {
        assert!(resolve_instant(&json!("2025-03-09T02:30:00"), LA).is_err());
    }

    #[test]
    fn formats_local_showtime_independent_of_host_zone() {
        let instant = "2025-01-17T15:30:00Z".parse::<DateTime<Utc>>().expect("utc");
        assert_eq!(format_showtime(instant, LA), "Fri • Jan 17 • 7:30 AM");
    }

    #[test]
    fn showtime_label_drops_leading_zeros() {
        let instant = "2025-07-04T02:05:00Z".parse::<DateTime<Utc>>().expect("utc");
        assert_eq!(format_showtime(instant, LA), "Thu • Jul 3 • 7:05 PM");

        let noon = "2025-01-17T20:00:00Z".parse::<DateTime<Utc>>().expect("utc");
        assert_eq!(format_showtime(noon, LA), "Fri • Jan 17 • 12:00 PM");
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        assert_eq!(parse_tz("Mars/Olympus_Mons"), chrono_tz::UTC);
        assert_eq!(parse_tz("America/Los_Angeles"), LA);
    }
}
