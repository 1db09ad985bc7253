//! CSRF token acquisition and caching.

use crate::envelope::parse_body;
use crate::{AuthError, AuthResult, Endpoints};
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Process-wide CSRF token cache.
///
/// Tokens never expire locally; a cached token is replaced only when the
/// server rejects it and a new one is fetched.
#[derive(Debug, Default)]
pub struct CsrfState {
    token: RwLock<Option<String>>,
}

impl CsrfState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

/// Fetches CSRF tokens from the auth server into a [`CsrfState`].
pub struct CsrfProvider {
    http_client: Client,
    endpoints: Arc<Endpoints>,
    state: Arc<CsrfState>,
    /// At most one fetch in flight.
    fetch_lock: Mutex<()>,
}

impl CsrfProvider {
    /// `http_client` must keep a cookie store; the server pairs the token
    /// with a cookie set on the same response.
    pub fn new(http_client: Client, endpoints: Arc<Endpoints>, state: Arc<CsrfState>) -> Self {
        Self {
            http_client,
            endpoints,
            state,
            fetch_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &Arc<CsrfState> {
        &self.state
    }

    /// Fetch a new token unconditionally and cache it.
    pub async fn fetch_csrf_token(&self) -> AuthResult<String> {
        let _guard = self.fetch_lock.lock().await;
        self.fetch_locked().await
    }

    /// Cached token, fetching one first on a cold cache.
    pub async fn token(&self) -> AuthResult<String> {
        if let Some(token) = self.state.get() {
            return Ok(token);
        }

        let _guard = self.fetch_lock.lock().await;
        // Another caller may have filled the cache while we waited.
        if let Some(token) = self.state.get() {
            return Ok(token);
        }
        self.fetch_locked().await
    }

    /// Replace a token the server rejected.
    ///
    /// If the cache no longer holds `stale`, some other caller already
    /// refreshed it and the newer token is returned without a fetch.
    pub async fn refresh(&self, stale: &str) -> AuthResult<String> {
        let _guard = self.fetch_lock.lock().await;
        if let Some(current) = self.state.get() {
            if current != stale {
                debug!("CSRF token already refreshed by another request");
                return Ok(current);
            }
        }
        self.fetch_locked().await
    }

    async fn fetch_locked(&self) -> AuthResult<String> {
        let url = self.endpoints.resolve(&self.endpoints.csrf_token())?;
        debug!(url = %url, "Fetching CSRF token");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "CSRF token fetch failed");
            return Err(AuthError::CsrfFetch(format!("HTTP {status}")));
        }

        let body = parse_body(&response.text().await?);
        let token = body
            .get("data")
            .and_then(|data| data.get("csrf_token"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::CsrfFetch("response has no data.csrf_token".to_string())
            })?
            .to_string();

        self.state.set(token.clone());
        info!("CSRF token refreshed");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_state() {
        let state = CsrfState::new();
        assert_eq!(state.get(), None);

        state.set("abc");
        assert_eq!(state.get().as_deref(), Some("abc"));

        state.set("def");
        assert_eq!(state.get().as_deref(), Some("def"));

        state.clear();
        assert_eq!(state.get(), None);
    }

    #[tokio::test]
    async fn test_token_uses_cache_without_network() {
        // Nothing listens on this port; a network call would fail.
        let endpoints = Arc::new(Endpoints::new(
            url::Url::parse("http://127.0.0.1:9").unwrap(),
            "",
            "/user/me",
        ));
        let state = Arc::new(CsrfState::new());
        state.set("cached");

        let provider = CsrfProvider::new(Client::new(), endpoints, state);
        assert_eq!(provider.token().await.unwrap(), "cached");
        assert_eq!(provider.refresh("older").await.unwrap(), "cached");
    }
}
