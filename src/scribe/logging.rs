//! Logging setup.
//!
//! Logs go to stderr so they never mix with command output on stdout.
//!
//! ## Environment Variables
//!
//! 1. **`SCRIBE_LOG`** (highest priority). A bare level such as `debug`
//!    applies to scribe only; anything with `=` or `,` is used as-is.
//! 2. **`RUST_LOG`**: standard tracing filter.
//! 3. **Default**: `warn` globally, `info` for scribe.

use std::env;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "SCRIBE_LOG";

const DEFAULT_FILTER: &str = "warn,scribe=info";

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Forces `debug` for scribe regardless of the environment (`--verbose`).
    pub verbose: bool,
    /// Disables ANSI colors in log lines.
    pub plain: bool,
}

/// Initialize logging. Safe to call more than once; later calls are no-ops.
pub fn init(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = if config.verbose {
        EnvFilter::new("warn,scribe=debug")
    } else {
        create_filter()
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!config.plain)
        .with_target(false)
        .try_init()
}

/// Initialize logging for tests. Never fails, even if another test got there first.
pub fn test() {
    let _ = fmt()
        .with_env_filter(create_filter())
        .with_test_writer()
        .try_init();
}

/// Implements the priority order: `SCRIBE_LOG` > `RUST_LOG` > default.
fn create_filter() -> EnvFilter {
    if let Ok(scribe_log) = env::var(LOG_ENV) {
        return expand_scribe_log(&scribe_log);
    }

    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    EnvFilter::new(DEFAULT_FILTER)
}

fn expand_scribe_log(scribe_log: &str) -> EnvFilter {
    if scribe_log.contains('=') || scribe_log.contains(',') {
        return EnvFilter::new(scribe_log);
    }
    EnvFilter::new(format!("warn,scribe={scribe_log}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_is_scoped_to_scribe() {
        let filter = expand_scribe_log("debug");
        assert!(filter.to_string().contains("scribe=debug"));
    }

    #[test]
    fn advanced_syntax_is_kept() {
        let filter = expand_scribe_log("scribe::session=trace");
        assert!(filter.to_string().contains("scribe::session=trace"));
    }
}
