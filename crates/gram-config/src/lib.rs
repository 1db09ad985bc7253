//! Configuration, paths and logging setup for the gram client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_PREFIX, DEFAULT_AUTH_SERVER_URL, DEFAULT_LOG_LEVEL, DEFAULT_ME_PATH,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, LogConfig};
pub use paths::Paths;
