//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from `LOG_LEVEL` and `LOG_FORMAT`
//! - Provide named component spans (the runtime's "named logger")
//! - Expose the accepted level and format names for the CLI
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - `RUST_LOG` wins over the configured level when set

use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Accepted log levels. `critical` filters like `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }

    /// Parse a level name, ignoring case. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Accepted log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

fn choices<T: ValueEnum>() -> Vec<String> {
    T::value_variants()
        .iter()
        .filter_map(|v| v.to_possible_value())
        .map(|v| v.get_name().to_string())
        .collect()
}

/// Names accepted by `--log-level`.
pub fn level_choices() -> Vec<String> {
    choices::<LogLevel>()
}

/// Names accepted by `--log-format`.
pub fn format_choices() -> Vec<String> {
    choices::<LogFormat>()
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed (e.g. by another
/// test), in which case the existing one is kept.
pub fn init_logger(level: LogLevel, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.is_ok()
}

/// A span that tags everything logged inside it with a component name.
pub fn named(name: &str) -> tracing::Span {
    tracing::info_span!("component", name = %name)
}

/// The span every job future runs in.
pub fn job_span(name: &str) -> tracing::Span {
    tracing::info_span!("job", name = %name)
}
