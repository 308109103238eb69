use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::constants::LOG_ENV;

/// Log to stderr; `DISCOVERABILITY_LOG` overrides the `-v` count.
pub fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV) {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            _ => EnvFilter::new("debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .without_time()
        .init();
}
