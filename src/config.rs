use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;

use crate::showtime;

/// Invocation surface. Explicit flags win over environment values, which win
/// over the built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "marquee-sync", version, about)]
pub struct Args {
    /// JSON endpoint that exposes the screening listings feed.
    #[arg(long, env = "MARQUEE_FEED_URL")]
    pub feed_url: String,

    /// List venues found in the feed and exit.
    #[arg(long)]
    pub list_venues: bool,

    /// Slug or name of the theatre to track (case-insensitive substring).
    #[arg(long, env = "MARQUEE_THEATRE", required_unless_present = "list_venues")]
    pub theatre: Option<String>,

    /// Only consider shows starting within this many hours from now.
    #[arg(
        long,
        env = "MARQUEE_LOOKAHEAD_HOURS",
        default_value_t = 96,
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    pub lookahead_hours: i64,

    /// IANA timezone used for formatting showtimes.
    #[arg(long, env = "MARQUEE_TIMEZONE", default_value = "America/Los_Angeles")]
    pub timezone: String,

    /// Request a QR block on the display template.
    #[arg(long, env = "MARQUEE_SHOW_QR")]
    pub show_qr: bool,

    /// Exit with code 2 when no matching screening is found.
    #[arg(long)]
    pub fail_on_missing: bool,

    /// Optional path to write the computed payload as JSON.
    #[arg(long)]
    pub payload_path: Option<PathBuf>,

    /// Emit the payload nested under a top-level `data` key.
    #[arg(long)]
    pub wrap: bool,

    /// Enable debug logging.
    #[arg(long, short)]
    pub verbose: bool,
}

/// Immutable configuration assembled once at startup and passed by value
/// into the pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub feed_url: String,
    pub theatre: String,
    pub timezone: Tz,
    pub lookahead_hours: i64,
    pub show_qr: bool,
    pub fail_on_missing: bool,
    pub payload_path: Option<PathBuf>,
    pub wrap: bool,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        Self {
            feed_url: args.feed_url.clone(),
            theatre: args.theatre.clone().unwrap_or_default(),
            timezone: showtime::parse_tz(&args.timezone),
            lookahead_hours: args.lookahead_hours,
            show_qr: args.show_qr,
            fail_on_missing: args.fail_on_missing,
            payload_path: args.payload_path.clone(),
            wrap: args.wrap,
        }
    }
}
