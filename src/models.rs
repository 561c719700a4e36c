use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One row lifted out of the listings feed before any time resolution.
///
/// `start_raw` keeps whatever the feed carried (ISO string, epoch number,
/// loosely formatted string); the showtime module decides whether it can
/// become a real instant.
#[derive(Debug, Clone)]
pub struct RawListing {
    pub venue: Option<String>,
    pub venue_id: Option<String>,
    pub title: String,
    pub start_raw: Value,
    pub poster_url: Option<String>,
    pub ticket_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Screening {
    pub theatre: String,
    pub title: String,
    pub start_utc: DateTime<Utc>,
    pub poster_url: Option<String>,
    pub ticket_url: Option<String>,
}
