pub mod config;
pub mod feed;
pub mod models;
pub mod payload;
pub mod select;
pub mod showtime;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use config::Config;
use payload::DisplayPayload;
use select::SelectionWindow;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NO_SCREENING: i32 = 2;

pub struct RunReport {
    pub payload: DisplayPayload,
    pub matched: bool,
}

/// One full pass: fetch, filter, pick, build. Always produces a
/// schema-conformant payload; `matched` says whether a screening qualified
/// so the caller can apply the fail-on-missing policy.
pub fn run(config: &Config) -> Result<RunReport> {
    info!("fetching listings from {}", config.feed_url);
    let source = feed::fetch(&config.feed_url)?;
    let listings = feed::listings(&source);
    info!("feed yielded {} listing(s)", listings.len());

    let now = Utc::now();
    let window = SelectionWindow::starting(now, config.lookahead_hours);
    let candidates =
        select::select_candidates(&listings, &config.theatre, config.timezone, &window);
    let next = select::pick_next(candidates);

    match &next {
        Some(screening) => info!(
            "next screening: {} at {} ({})",
            screening.title,
            screening.start_utc.to_rfc3339(),
            screening.ticket_url.as_deref().unwrap_or("no ticket URL")
        ),
        None => warn!(
            "no screening found for theatre '{}'; generating placeholder payload",
            config.theatre
        ),
    }

    let payload = payload::build(
        next.as_ref(),
        &config.theatre,
        config.timezone,
        config.show_qr,
        now,
    );
    Ok(RunReport {
        matched: next.is_some(),
        payload,
    })
}

/// Output boundary: print the payload to stdout and, when configured, write
/// it to the payload file. Delivery beyond this point belongs to whatever
/// publishes the file or scrapes the output.
pub fn emit(payload: &DisplayPayload, config: &Config) -> Result<()> {
    let rendered = if config.wrap {
        serde_json::to_string_pretty(&payload::envelope(payload))?
    } else {
        serde_json::to_string_pretty(payload)?
    };
    if let Some(path) = &config.payload_path {
        std::fs::write(path, &rendered)
            .with_context(|| format!("unable to write payload to {}", path.display()))?;
        info!("wrote payload to {}", path.display());
    }
    println!("{rendered}");
    Ok(())
}

/// Print `id<TAB>name` for every venue in the feed, sorted by name.
pub fn list_venues(feed_url: &str) -> Result<()> {
    let source = feed::fetch(feed_url)?;
    let mut venues: Vec<(String, String)> = feed::venue_index(&source).into_iter().collect();
    if venues.is_empty() {
        bail!("no venues found in feed");
    }
    venues.sort_by_key(|(_, name)| name.to_lowercase());
    for (id, name) in venues {
        println!("{id}\t{name}");
    }
    Ok(())
}
