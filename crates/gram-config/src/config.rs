//! Configuration management for the gram client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default auth server URL (can be overridden at compile time via GRAM_AUTH_SERVER_URL).
pub const DEFAULT_AUTH_SERVER_URL: &str = match option_env!("GRAM_AUTH_SERVER_URL") {
    Some(url) => url,
    None => "http://localhost:5000",
};

/// Default API prefix. Newer auth server builds mount everything under `/v1`.
pub const DEFAULT_API_PREFIX: &str = "";

/// Default profile endpoint path.
pub const DEFAULT_ME_PATH: &str = "/user/me";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_LOG_LEVEL: &str = "GRAM_LOG_LEVEL";
const ENV_AUTH_SERVER_URL: &str = "GRAM_AUTH_SERVER_URL";
const ENV_API_PREFIX: &str = "GRAM_API_PREFIX";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the auth server.
    #[serde(default = "default_auth_server_url")]
    pub auth_server_url: String,
    /// Prefix for auth routes, either empty or a path like `/v1`.
    #[serde(default)]
    pub api_prefix: String,
    /// Path of the profile endpoint (not prefixed).
    #[serde(default = "default_me_path")]
    pub me_path: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_auth_server_url() -> String {
    DEFAULT_AUTH_SERVER_URL.to_string()
}

fn default_me_path() -> String {
    DEFAULT_ME_PATH.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auth_server_url: default_auth_server_url(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            me_path: default_me_path(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(log_level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = log_level;
        }
        if let Some(url) = lookup(ENV_AUTH_SERVER_URL) {
            self.auth_server_url = url;
        }
        if let Some(prefix) = lookup(ENV_API_PREFIX) {
            self.api_prefix = prefix;
        }
    }

    /// Check that the URL parses and the prefix is well formed.
    pub fn validate(&self) -> CoreResult<()> {
        self.auth_server_url()?;

        if !self.api_prefix.is_empty()
            && (!self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/'))
        {
            return Err(CoreError::Config(format!(
                "api_prefix must be empty or look like \"/v1\", got {:?}",
                self.api_prefix
            )));
        }

        if !self.me_path.starts_with('/') {
            return Err(CoreError::Config(format!(
                "me_path must start with '/', got {:?}",
                self.me_path
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the auth server URL as a parsed URL.
    pub fn auth_server_url(&self) -> CoreResult<Url> {
        Url::parse(&self.auth_server_url).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.auth_server_url, DEFAULT_AUTH_SERVER_URL);
        assert_eq!(config.api_prefix, "");
        assert_eq!(config.me_path, "/user/me");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(
            &config_path,
            r#"{ "log_level": "debug", "api_prefix": "/v1" }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api_prefix, "/v1");
        assert_eq!(config.me_path, DEFAULT_ME_PATH);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            auth_server_url: "https://auth.example.com".to_string(),
            api_prefix: "/v1".to_string(),
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_apply_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_LOG_LEVEL, "trace"),
            (ENV_AUTH_SERVER_URL, "https://staging.example.com"),
            (ENV_API_PREFIX, "/v1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.log_level, "trace");
        assert_eq!(config.auth_server_url, "https://staging.example.com");
        assert_eq!(config.api_prefix, "/v1");
    }

    #[test]
    fn test_config_invalid_url() {
        let config = Config {
            auth_server_url: "not a valid url".to_string(),
            ..Config::default()
        };
        assert!(config.auth_server_url().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_malformed_prefix() {
        for prefix in ["v1", "/v1/"] {
            let config = Config {
                api_prefix: prefix.to_string(),
                ..Config::default()
            };
            assert!(matches!(config.validate(), Err(CoreError::Config(_))));
        }
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
