//! Tracing bootstrap and the user-facing output helpers shared by the
//! commands.

use ansi_term::Colour;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Prints an informational line with the `[*]` prefix.
pub fn println_info(txt: &str) {
    tracing::info!("{} {}", Colour::Green.paint("[*]"), txt);
}

/// Prints a failure line with the `[!] ERROR:` prefix.
pub fn println_error(txt: &str) {
    tracing::error!("{} {}", Colour::Red.bold().paint("[!] ERROR:"), txt);
}

/// Initializes the global subscriber. `RUST_LOG` overrides the default
/// info-level filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .with_level(false)
        .init();
}
