//! Diagnostics emitted by the library itself.
//!
//! Pipeline construction, registry pruning and exception routing are
//! reported through `tracing`. Applications that already install a
//! subscriber get these events for free; [`init_logging`] installs one for
//! those that do not. Events go to stderr, as human-readable lines or JSON.
//!
//! ```no_run
//! use ml_core::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from_env()).ok();
//! ```

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;

use ml_common::{LogError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive for the workspace crates at `level`.
pub fn filter_directive(level: LogLevel) -> String {
    format!("ml_core={level},ml_redact={level}")
}

/// Install a global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config.level)));

    let installed = match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| LogError::runtime(format!("failed to install subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Debug), "ml_core=debug,ml_redact=debug");
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig::default().with_level(LogLevel::Off);
        let _ = init_logging(&config);
        let second = init_logging(&config);
        assert!(matches!(second, Err(LogError::Runtime(_))));
    }
}
