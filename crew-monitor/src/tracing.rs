//! Logging setup.
//!
//! Modules pull the macros in through [`prelude`] so the subscriber
//! wiring stays in one place. Under systemd (detected through
//! `JOURNAL_STREAM`) events go to the journal, otherwise to stderr with
//! local timestamps. `RUST_LOG` overrides the default `info` filter.

use time::macros::format_description;
use tracing_subscriber::{EnvFilter, fmt, fmt::time::LocalTime, prelude::*};

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber, preferring the journal when available.
pub fn init_journald_or_stderr() {
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(journald)
                    .init();
                return;
            }
            Err(e) => eprintln!("journald unavailable, logging to stderr: {e}"),
        }
    }

    init_stderr();
}

/// Install a stderr subscriber with local wall-clock timestamps.
pub fn init_stderr() {
    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_timer(timer)
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
