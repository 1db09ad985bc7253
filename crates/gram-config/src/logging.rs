//! Logging initialization.
//!
//! Thin wrapper over the observability crate that points the JSONL file at
//! the client's own log directory.

use crate::Paths;

pub use observability::LogConfig;

/// Initialize logging for a gram binary.
///
/// # Arguments
///
/// * `service_name` - Name written into every log line
/// * `level` - Default log level (trace, debug, info, warn, error)
/// * `paths` - Client paths; logs go to `paths.log_file()`
/// * `also_stderr` - Mirror events to stderr
pub fn init_logging(service_name: &str, level: &str, paths: &Paths, also_stderr: bool) {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}
