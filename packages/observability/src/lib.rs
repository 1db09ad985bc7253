//! # Observability
//!
//! Logging setup for the gram crates.
//!
//! Library crates only emit `tracing` events. The binary calls
//! [`init_with_config`] once at startup, which installs:
//!
//! - a JSON-lines file layer (`~/.gram/logs/gram.jsonl` by default) with
//!   secret-bearing fields redacted, and
//! - an optional compact stderr layer.
//!
//! `RUST_LOG` overrides the configured default level.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "cli".into(),
//!         default_level: "debug".into(),
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod json_layer;
mod writer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{is_redacted_field, JsonLayer, LogEntry, REDACTED};
pub use writer::{FileLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "cli").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.gram/logs/gram.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default JSONL log location.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gram").join("logs").join("gram.jsonl"))
}

/// Initialize the observability layer with custom configuration.
///
/// If the log file cannot be opened, logging falls back to stderr only.
/// Calling this more than once is a no-op.
pub fn init_with_config(config: LogConfig) {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let file_writer = config
        .log_path
        .clone()
        .or_else(default_log_path)
        .map(|path| (FileLogWriter::new(&path), path));

    let (json_layer, log_path, open_error) = match file_writer {
        Some((Ok(writer), path)) => (
            Some(JsonLayer::new(
                config.service_name.clone(),
                WriterFactory::new(writer),
            )),
            Some(path),
            None,
        ),
        Some((Err(e), path)) => (None, Some(path), Some(e)),
        None => (None, None, None),
    };

    // Without a file we always need somewhere to write.
    let want_stderr = config.also_stderr || json_layer.is_none();
    let stderr_layer = want_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter())
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer.map(|layer| layer.with_filter(env_filter())))
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match (log_path, open_error) {
        (Some(path), None) => {
            tracing::debug!(log_path = %path.display(), "observability initialized")
        }
        (Some(path), Some(e)) => {
            tracing::warn!(log_path = %path.display(), error = %e, "log file unavailable, using stderr")
        }
        _ => tracing::warn!("home directory unknown, using stderr for logs"),
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};
