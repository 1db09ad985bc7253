//! CLI command implementations.

mod auth;
mod profile;

pub use auth::{login, logout, register, status};
pub use profile::{me, refresh};

use anyhow::Result;
use auth_client::{AuthError, AuthSession};
use gram_config::{Config, Paths};
use token_store::create_token_store;
use tracing::warn;

/// Loaded configuration plus the paths it came from.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
}

impl Context {
    /// Load `~/.gram/config.json` and environment overrides. `server`
    /// replaces the configured auth server URL.
    pub fn load(server: Option<&str>) -> Result<Self> {
        let paths = Paths::new()?;
        let mut config = Config::load(&paths)?;
        if let Some(server) = server {
            config.auth_server_url = server.to_string();
            config.validate()?;
        }
        Ok(Self { paths, config })
    }

    /// Open a session over the durable token file.
    pub fn open_session(&self) -> Result<AuthSession> {
        let tokens = create_token_store(&self.paths.tokens_file());
        Ok(AuthSession::new(&self.config, tokens)?)
    }
}

/// Turn an auth failure into a CLI error. An unusable session is dropped
/// so the next run starts clean. The [`AuthError`] stays downcastable.
fn auth_failure(session: &AuthSession, err: AuthError) -> anyhow::Error {
    if err.is_reauth_required() {
        if let Err(e) = session.clear_session() {
            warn!(error = %e, "Failed to clear stored session");
        }
        return anyhow::Error::new(err)
            .context("Session expired. Run 'gram login' to sign in again");
    }
    if err.is_transient() {
        return anyhow::Error::new(err).context("Auth server unavailable, try again later");
    }
    anyhow::Error::new(err)
}

/// HTTP status behind a CLI error, when it came from the auth server.
pub fn error_status(err: &anyhow::Error) -> Option<u16> {
    err.downcast_ref::<AuthError>().and_then(AuthError::status)
}
