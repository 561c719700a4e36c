use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{json, Value};

use crate::feed::POSTER_BASE;
use crate::models::Screening;
use crate::showtime;

pub const NO_SCREENING_TITLE: &str = "No screening scheduled";

/// The flat object the display template consumes. All seven keys are present
/// on every path, including the fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub title: String,
    pub subtitle: String,
    pub theatre: String,
    pub poster_url: String,
    pub ticket_url: Option<String>,
    pub show_qr: bool,
    pub refreshed_at: String,
}

/// Map the selected screening (or the no-show state) into the payload.
///
/// Pure: `now` is the caller's captured build instant, so two calls with the
/// same inputs produce identical output.
pub fn build(
    screening: Option<&Screening>,
    theatre_query: &str,
    tz: Tz,
    show_qr_enabled: bool,
    now: DateTime<Utc>,
) -> DisplayPayload {
    match screening {
        Some(screening) => DisplayPayload {
            title: screening.title.clone(),
            subtitle: showtime::format_showtime(screening.start_utc, tz),
            theatre: screening.theatre.clone(),
            poster_url: screening
                .poster_url
                .clone()
                .unwrap_or_else(placeholder_poster),
            ticket_url: screening.ticket_url.clone(),
            show_qr: show_qr_enabled && screening.ticket_url.is_some(),
            refreshed_at: now.to_rfc3339(),
        },
        None => DisplayPayload {
            title: NO_SCREENING_TITLE.to_string(),
            subtitle: showtime::format_updated(now, tz),
            theatre: theatre_query.to_string(),
            poster_url: placeholder_poster(),
            ticket_url: None,
            show_qr: false,
            refreshed_at: now.to_rfc3339(),
        },
    }
}

/// Fixed placeholder art under the same public poster base.
pub fn placeholder_poster() -> String {
    format!("{POSTER_BASE}/placeholder_400x600.jpg")
}

/// Wrapper form for polling consumers that expect a dotted-path lookup.
pub fn envelope(payload: &DisplayPayload) -> Value {
    json!({ "data": payload })
}
