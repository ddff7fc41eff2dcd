//! Logging setup for the tote CLI.
//!
//! The library crates emit `tracing` events; this installs the subscriber
//! that prints them to stderr.
//!
//! ```rust,no_run
//! use tote_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("starting build");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Call once, before any logging happens.
///
/// The filter is picked in this order:
/// 1. `--verbose`: debug for the tote crates
/// 2. `--quiet`: errors only
/// 3. `RUST_LOG`
/// 4. info for the tote crates
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = filter_for(verbose, quiet);

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("tote=debug,tote_cli=debug,tote_bundler=debug,tote_config=debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tote=info,tote_cli=info,tote_bundler=info,tote_config=info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be installed once per process, so only
    // the filter selection is tested here.

    #[test]
    fn verbose_wins_over_environment() {
        let filter = filter_for(true, false);
        assert!(filter.to_string().contains("tote_bundler=debug"));
    }

    #[test]
    fn quiet_keeps_errors_only() {
        assert!(filter_for(false, true).to_string().contains("error"));
    }
}
