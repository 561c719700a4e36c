use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::models::{RawListing, Screening};
use crate::showtime;

/// The qualification span for one run. A screening qualifies iff
/// `now <= start < cutoff`; anything in the past or beyond the horizon is
/// never selected, not even as a fallback.
#[derive(Debug, Clone, Copy)]
pub struct SelectionWindow {
    pub now: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
}

impl SelectionWindow {
    pub fn starting(now: DateTime<Utc>, lookahead_hours: i64) -> Self {
        Self {
            now,
            cutoff: now + Duration::hours(lookahead_hours),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.now <= instant && instant < self.cutoff
    }
}

/// Reduce the feed to screenings of the tracked venue inside the window.
///
/// The query matches when it equals a row's venue id, or when it occurs
/// case-insensitively inside the venue label, so one configured slug can
/// match a verbose label. Rows whose start cannot be resolved are dropped
/// and counted; output preserves feed order.
pub fn select_candidates(
    listings: &[RawListing],
    venue_query: &str,
    tz: Tz,
    window: &SelectionWindow,
) -> Vec<Screening> {
    let query_lower = venue_query.to_lowercase();
    let mut candidates = Vec::new();
    let mut dropped = 0usize;

    for listing in listings {
        let id_match = listing.venue_id.as_deref() == Some(venue_query);
        let label_match = listing
            .venue
            .as_deref()
            .map(|label| label.to_lowercase().contains(&query_lower))
            .unwrap_or(false);
        if !id_match && !label_match {
            continue;
        }

        let start_utc = match showtime::resolve_instant(&listing.start_raw, tz) {
            Ok(instant) => instant,
            Err(err) => {
                debug!("dropping '{}': {err}", listing.title);
                dropped += 1;
                continue;
            }
        };
        if !window.contains(start_utc) {
            continue;
        }

        candidates.push(Screening {
            theatre: listing
                .venue
                .clone()
                .or_else(|| listing.venue_id.clone())
                .unwrap_or_default(),
            title: listing.title.clone(),
            start_utc,
            poster_url: listing.poster_url.clone(),
            ticket_url: listing.ticket_url.clone(),
        });
    }

    if dropped > 0 {
        warn!("dropped {dropped} listing(s) with unparseable showtimes");
    }
    candidates
}

/// Earliest start wins. The sort is stable, so screenings sharing the
/// identical instant resolve to first-in-feed order.
pub fn pick_next(mut candidates: Vec<Screening>) -> Option<Screening> {
    candidates.sort_by_key(|screening| screening.start_utc);
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    const LA: Tz = chrono_tz::America::Los_Angeles;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 17, 12, 0, 0).unwrap()
    }

    fn raw(venue: Option<&str>, venue_id: Option<&str>, title: &str, start: Value) -> RawListing {
        RawListing {
            venue: venue.map(str::to_string),
            venue_id: venue_id.map(str::to_string),
            title: title.to_string(),
            start_raw: start,
            poster_url: None,
            ticket_url: Some(format!("https://tickets.example/{title}")),
        }
    }

    fn aero(title: &str, start: Value) -> RawListing {
        raw(Some("Aero Theatre, Santa Monica"), Some("aero"), title, start)
    }

    #[test]
    fn candidates_satisfy_window_and_venue_match() {
        let listings = vec![
            aero("Past", json!("2025-01-17T11:00:00Z")),
            aero("Soon", json!("2025-01-17T14:00:00Z")),
            aero("Later", json!("2025-01-19T14:00:00Z")),
            raw(Some("Vista Theater"), None, "Elsewhere", json!("2025-01-17T14:00:00Z")),
        ];

        let window = SelectionWindow::starting(noon(), 48);
        let candidates = select_candidates(&listings, "aero", LA, &window);
        let titles: Vec<&str> = candidates.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Soon", "Later"]);
        for screening in &candidates {
            assert!(window.contains(screening.start_utc));
            assert!(screening.theatre.to_lowercase().contains("aero"));
        }
    }

    #[test]
    fn nearest_show_wins_regardless_of_lookahead() {
        // T-1h, T+2h and T+50h around a fixed now.
        let listings = vec![
            aero("Yesterday's Matinee", json!("2025-01-17T11:00:00Z")),
            aero("Tonight's Feature", json!("2025-01-17T14:00:00Z")),
            aero("Weekend Feature", json!("2025-01-19T14:00:00Z")),
        ];

        let narrow = SelectionWindow::starting(noon(), 48);
        let picked = pick_next(select_candidates(&listings, "aero", LA, &narrow))
            .expect("candidate within 48h");
        assert_eq!(picked.title, "Tonight's Feature");

        let wide = SelectionWindow::starting(noon(), 96);
        let picked = pick_next(select_candidates(&listings, "aero", LA, &wide))
            .expect("candidate within 96h");
        assert_eq!(picked.title, "Tonight's Feature");
    }

    #[test]
    fn window_bounds_are_half_open() {
        let window = SelectionWindow::starting(noon(), 48);
        assert!(window.contains(noon()));
        assert!(!window.contains(noon() + Duration::hours(48)));
        assert!(window.contains(noon() + Duration::hours(48) - Duration::seconds(1)));
    }

    #[test]
    fn exact_venue_id_matches_without_label() {
        let listings = vec![raw(None, Some("egyptian"), "Nosferatu", json!("2025-01-17T20:00:00Z"))];
        let window = SelectionWindow::starting(noon(), 48);

        let candidates = select_candidates(&listings, "egyptian", LA, &window);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].theatre, "egyptian");

        assert!(select_candidates(&listings, "egypt", LA, &window).is_empty());
    }

    #[test]
    fn unmatched_query_yields_none() {
        let listings = vec![aero("Soon", json!("2025-01-17T14:00:00Z"))];
        let window = SelectionWindow::starting(noon(), 48);
        let candidates = select_candidates(&listings, "bijou", LA, &window);
        assert!(pick_next(candidates).is_none());
    }

    #[test]
    fn unparseable_rows_drop_without_aborting() {
        let listings = vec![
            aero("Broken", json!("sometime soon")),
            aero("First Valid", json!("2025-01-17T15:00:00Z")),
            aero("Second Valid", json!("2025-01-17T14:00:00Z")),
        ];
        let window = SelectionWindow::starting(noon(), 48);
        let candidates = select_candidates(&listings, "aero", LA, &window);
        assert_eq!(candidates.len(), 2);

        let picked = pick_next(candidates).expect("valid rows remain");
        assert_eq!(picked.title, "Second Valid");
    }

    #[test]
    fn identical_instants_resolve_to_feed_order() {
        let listings = vec![
            aero("Listed First", json!("2025-01-17T14:00:00Z")),
            aero("Listed Second", json!("2025-01-17T14:00:00Z")),
        ];
        let window = SelectionWindow::starting(noon(), 48);
        let picked = pick_next(select_candidates(&listings, "aero", LA, &window))
            .expect("tied candidates");
        assert_eq!(picked.title, "Listed First");
    }

    #[test]
    fn selector_result_is_earliest() {
        let listings = vec![
            aero("C", json!("2025-01-18T04:00:00Z")),
            aero("A", json!("2025-01-17T18:00:00Z")),
            aero("B", json!("2025-01-17T22:00:00Z")),
        ];
        let window = SelectionWindow::starting(noon(), 48);
        let candidates = select_candidates(&listings, "aero", LA, &window);
        let earliest = pick_next(candidates.clone()).expect("non-empty");
        for other in &candidates {
            assert!(earliest.start_utc <= other.start_utc);
        }
        assert_eq!(earliest.title, "A");
    }
}
