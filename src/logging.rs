//! Logging configuration for SQL Advisor.
//!
//! Logs always go to stderr so stdout carries only the JSON report.

use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initializes logging to stderr.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
pub fn init_stderr_logging(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "info");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(4), "trace");
    }
}
