use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::RawListing;

/// Public, resized poster base used by feed uploads.
pub const POSTER_BASE: &str = "https://storage.googleapis.com/\
revival-hub-ab2a8.firebasestorage.app/screening-posters/resized";

const VENUE_ID_KEYS: [&str; 4] = ["venueId", "venue_id", "venueID", "venue"];
const VENUE_LABEL_KEYS: [&str; 6] = [
    "venue_name",
    "theatre_name",
    "theatre",
    "theater",
    "cinema",
    "location",
];
const SHOWTIME_KEYS: [&str; 5] = ["showtime", "show_time", "when", "datetime", "start_at"];
const TITLE_KEYS: [&str; 5] = ["title", "film", "movie", "name", "filmTitle"];
const POSTER_KEYS: [&str; 4] = ["poster", "poster_url", "image", "artwork"];
const POSTER_SLUG_KEYS: [&str; 5] = [
    "poster-image-path",
    "poster_image_path",
    "posterImagePath",
    "posterSlug",
    "poster_slug",
];
const TICKET_KEYS: [&str; 4] = ["ticket_url", "tickets", "link", "url"];

// Rows are recognized by carrying both a title-ish and a showtime-ish key.
const TITLE_MARKERS: [&str; 3] = ["title", "film", "films"];
const SHOWTIME_MARKERS: [&str; 4] = ["showtime", "showtimes", "when", "screening_times"];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(String),
    #[error("feed parse error: {0}")]
    Parse(String),
    #[error("unrecognized feed shape: {0}")]
    Shape(String),
}

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("marquee-sync/0.1 (+https://github.com/mike/marquee-sync)")
        .build()
        .expect("http client")
});

/// Retrieve the raw listings document. Transport failures, non-success
/// statuses and a malformed document are all fatal for the run.
pub fn fetch(url: &str) -> Result<Value, FetchError> {
    let response = CLIENT
        .get(url)
        .send()
        .map_err(|err| FetchError::Http(format!("request failed for {url}: {err}")))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| FetchError::Http(format!("unable to read body for {url}: {err}")))?;
    if !status.is_success() {
        return Err(FetchError::Http(format!("status {status} for {url}")));
    }
    decode(&body)
}

/// Decode the feed body. Split from [`fetch`] so document handling is
/// testable without a network.
pub fn decode(body: &str) -> Result<Value, FetchError> {
    let doc: Value =
        serde_json::from_str(body).map_err(|err| FetchError::Parse(err.to_string()))?;
    match doc {
        Value::Object(_) | Value::Array(_) => Ok(doc),
        other => Err(FetchError::Shape(format!(
            "expected an object or array at the top level, got {other}"
        ))),
    }
}

/// Extract every recognizable listing row from a loose feed document.
/// Unrecognizable rows are skipped; a fixed document always yields the same
/// rows in the same order.
pub fn listings(source: &Value) -> Vec<RawListing> {
    let index = venue_index(source);
    let mut out = Vec::new();

    for row in flatten_rows(source) {
        let venue_id = coalesce(&row, &VENUE_ID_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string);
        let venue = venue_id
            .as_deref()
            .and_then(|id| index.get(id).cloned())
            .or_else(|| coalesce(&row, &VENUE_LABEL_KEYS).map(label_text));

        let start_raw = match showtime_value(&row).cloned() {
            Some(value) => value,
            None => {
                let skipped = Value::Object(row);
                debug!("skipping row with no showtime: {}", skipped);
                continue;
            }
        };

        let poster_url = coalesce(&row, &POSTER_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| coalesce(&row, &POSTER_SLUG_KEYS).and_then(poster_from_slug));

        let ticket_url = coalesce(&row, &TICKET_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                first_in_list(&row, "ticket_urls")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        let title = coalesce(&row, &TITLE_KEYS)
            .map(label_text)
            .or_else(|| first_film_name(&row))
            .unwrap_or_else(|| "Untitled".to_string());

        out.push(RawListing {
            venue,
            venue_id,
            title,
            start_raw,
            poster_url,
            ticket_url,
        });
    }

    out
}

/// Flatten a loose feed document into row objects. Objects carrying a
/// `screenings` array contribute their remaining fields to every child row,
/// so venue context declared on a parent reaches the rows beneath it.
pub fn flatten_rows(source: &Value) -> Vec<Map<String, Value>> {
    let mut rows = Vec::new();
    collect_rows(source, &mut rows);
    rows
}

fn collect_rows(node: &Value, out: &mut Vec<Map<String, Value>>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::Array(children)) = map.get("screenings") {
                let parent: Map<String, Value> = map
                    .iter()
                    .filter(|(key, _)| key.as_str() != "screenings")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                for child in children {
                    let mut merged = parent.clone();
                    match child {
                        Value::Object(fields) => {
                            for (key, value) in fields {
                                merged.insert(key.clone(), value.clone());
                            }
                        }
                        bare_time => {
                            merged.insert("showtimes".to_string(), bare_time.clone());
                        }
                    }
                    collect_rows(&Value::Object(merged), out);
                }
                return;
            }

            if has_any(map, &TITLE_MARKERS) && has_any(map, &SHOWTIME_MARKERS) {
                out.push(map.clone());
                return;
            }

            for value in map.values() {
                collect_rows(value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_rows(item, out);
            }
        }
        _ => {}
    }
}

/// Venue id -> human-readable name pairs, collected from `venues` arrays
/// anywhere in the document. First occurrence of an id wins.
pub fn venue_index(source: &Value) -> HashMap<String, String> {
    let mut index = HashMap::new();
    collect_venues(source, &mut index);
    index
}

fn collect_venues(node: &Value, index: &mut HashMap<String, String>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::Array(venues)) = map.get("venues") {
                for venue in venues {
                    if let Value::Object(fields) = venue {
                        let id = coalesce(fields, &["id", "venueId", "key"]).and_then(Value::as_str);
                        let name =
                            coalesce(fields, &["name", "label", "title"]).and_then(Value::as_str);
                        if let (Some(id), Some(name)) = (id, name) {
                            index
                                .entry(id.to_string())
                                .or_insert_with(|| name.to_string());
                        }
                    }
                }
            }
            for value in map.values() {
                collect_venues(value, index);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_venues(item, index);
            }
        }
        _ => {}
    }
}

/// First present, non-empty value among the given keys.
fn coalesce<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| is_present(value))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn showtime_value(row: &Map<String, Value>) -> Option<&Value> {
    coalesce(row, &SHOWTIME_KEYS)
        .or_else(|| first_in_list(row, "showtimes"))
        .or_else(|| first_in_list(row, "screening_times"))
}

fn first_in_list<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match row.get(key) {
        Some(Value::Array(items)) => items.first(),
        // A bare value under a list key still counts as the one entry.
        Some(value) if is_present(value) => Some(value),
        _ => None,
    }
}

fn first_film_name(row: &Map<String, Value>) -> Option<String> {
    if let Some(Value::Array(films)) = row.get("films") {
        if let Some(Value::Object(film)) = films.first() {
            return coalesce(film, &["name", "title"]).map(label_text);
        }
    }
    None
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a public poster URL from a slug or path-like value. The feed stores
/// paths like `abc123.jpg`; resized variants live at
/// `{POSTER_BASE}/{stem}_400x600.jpg`.
fn poster_from_slug(slug: &Value) -> Option<String> {
    let text = match slug {
        Value::String(s) => s.clone(),
        other if is_present(other) => other.to_string(),
        _ => return None,
    };
    let trimmed = text.trim().trim_matches('/');
    let base_name = trimmed.rsplit('/').next()?;
    let stem = base_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(base_name);
    if stem.is_empty() {
        return None;
    }
    Some(format!("{POSTER_BASE}/{stem}_400x600.jpg"))
}

fn has_any(row: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| row.contains_key(*key))
}
