use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use marquee_sync::config::{Args, Config};
use marquee_sync::{EXIT_FAILURE, EXIT_NO_SCREENING, EXIT_OK};

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    std::process::exit(match run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            EXIT_FAILURE
        }
    });
}

fn run(args: &Args) -> anyhow::Result<i32> {
    if args.list_venues {
        marquee_sync::list_venues(&args.feed_url)?;
        return Ok(EXIT_OK);
    }

    let config = Config::from_args(args);
    let report = marquee_sync::run(&config)?;

    // The fallback payload is emitted even when fail-on-missing will flag
    // the run afterwards.
    marquee_sync::emit(&report.payload, &config)?;

    if !report.matched && config.fail_on_missing {
        error!("no screening found for theatre '{}'", config.theatre);
        return Ok(EXIT_NO_SCREENING);
    }
    Ok(EXIT_OK)
}

// Logs go to stderr; stdout carries only the payload.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
