//! Route table of the auth server.

use crate::AuthResult;
use gram_config::Config;
use url::Url;

/// Resolves route paths against the configured server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
    prefix: String,
    me_path: String,
}

impl Endpoints {
    pub fn new(base: Url, prefix: impl Into<String>, me_path: impl Into<String>) -> Self {
        Self {
            base,
            prefix: prefix.into(),
            me_path: me_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self::new(
            config.auth_server_url()?,
            config.api_prefix.clone(),
            config.me_path.clone(),
        ))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn csrf_token(&self) -> String {
        self.auth_route("csrf-token")
    }

    pub fn login(&self) -> String {
        self.auth_route("login")
    }

    pub fn register(&self) -> String {
        self.auth_route("register")
    }

    pub fn refresh(&self) -> String {
        self.auth_route("refresh")
    }

    pub fn logout(&self) -> String {
        self.auth_route("logout")
    }

    /// Profile route. Not prefixed.
    pub fn me(&self) -> &str {
        &self.me_path
    }

    fn auth_route(&self, name: &str) -> String {
        format!("{}/auth/{}", self.prefix, name)
    }

    /// Absolute URL for a route path. Absolute URLs pass through unchanged.
    pub fn resolve(&self, path: &str) -> AuthResult<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }

        // Keep any path the base URL already has, e.g. `https://host/api`.
        let base = self.base.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }
}
