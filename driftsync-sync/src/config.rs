//! Logging configuration.
//!
//! An explicit value handed to startup code, never mutated from deep call
//! stacks. Process-wide for the lifetime of one process instance.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Output style for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogStyle {
    /// Message-focused single-line output.
    #[default]
    Compact,
    /// Full output with targets and fields.
    Full,
}

/// Recognized logging options.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level emitted at verbosity 0.
    pub min_level: Level,
    /// Verbosity threshold: 1 lowers the floor to DEBUG, 2+ to TRACE.
    pub verbosity: u8,
    /// Output style.
    pub style: LogStyle,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            min_level: Level::WARN,
            verbosity: 0,
            style: LogStyle::Compact,
        }
    }
}

impl LogConfig {
    /// The level actually installed, after applying verbosity.
    pub fn effective_level(&self) -> Level {
        match self.verbosity {
            0 => self.min_level,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// Returns false when a subscriber was already installed (tests, embedding
/// applications); the existing one stays in effect.
pub fn init_logging(config: &LogConfig) -> bool {
    let builder = FmtSubscriber::builder().with_max_level(config.effective_level());
    match config.style {
        LogStyle::Compact => builder
            .with_target(false)
            .compact()
            .try_init()
            .is_ok(),
        LogStyle::Full => builder.try_init().is_ok(),
    }
}
