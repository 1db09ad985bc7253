//! Account operations over the CSRF and refresh protocols.

use crate::auth_fsm::{SessionMachineInput, SessionState, SessionStateMachine};
use crate::envelope::{classify_failure, extract_payload, message_of, TokenPair, UserProfile};
use crate::refresher::RefreshTokenRequest;
use crate::validation::{validate_login, validate_registration};
use crate::{
    AuthError, AuthResult, CsrfProvider, CsrfState, Endpoints, RequestClient, RequestOptions,
    SessionRefresher,
};
use gram_config::Config;
use reqwest::{Client, Method};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use token_store::TokenStore;
use tracing::{debug, info, warn};

/// User agent reported to the login endpoint.
pub const DEFAULT_USER_AGENT: &str = concat!("gram/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username_or_email: &'a str,
    password: &'a str,
    user_agent: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Client-side session against the auth server.
pub struct AuthSession {
    endpoints: Arc<Endpoints>,
    tokens: Arc<TokenStore>,
    requests: RequestClient,
    refresher: SessionRefresher,
    fsm: Arc<SessionStateMachine>,
    user_agent: String,
}

impl AuthSession {
    /// Create a session with its own CSRF cache.
    pub fn new(config: &Config, tokens: TokenStore) -> AuthResult<Self> {
        Self::with_csrf_state(config, tokens, Arc::new(CsrfState::new()))
    }

    /// Create a session sharing an existing CSRF cache.
    pub fn with_csrf_state(
        config: &Config,
        tokens: TokenStore,
        csrf_state: Arc<CsrfState>,
    ) -> AuthResult<Self> {
        let endpoints = Arc::new(Endpoints::from_config(config)?);
        let http_client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let tokens = Arc::new(tokens);
        let fsm = Arc::new(SessionStateMachine::restored(tokens.has_session()?));

        let csrf = Arc::new(CsrfProvider::new(
            http_client.clone(),
            endpoints.clone(),
            csrf_state,
        ));
        let requests = RequestClient::new(http_client.clone(), endpoints.clone(), csrf);
        let refresher =
            SessionRefresher::new(http_client, endpoints.clone(), tokens.clone(), fsm.clone());

        debug!(server = %endpoints.base(), "Auth session created");

        Ok(Self {
            endpoints,
            tokens,
            requests,
            refresher,
            fsm,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn state(&self) -> SessionState {
        self.fsm.state()
    }

    pub fn has_session(&self) -> AuthResult<bool> {
        Ok(self.tokens.has_session()?)
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn requests(&self) -> &RequestClient {
        &self.requests
    }

    pub fn refresher(&self) -> &SessionRefresher {
        &self.refresher
    }

    /// Log in and persist the issued token pair. Returns the server message.
    pub async fn login(&self, username_or_email: &str, password: &str) -> AuthResult<String> {
        validate_login(username_or_email, password)?;

        self.fsm.try_transition(&SessionMachineInput::LoginAttempt);
        info!(username_or_email = %username_or_email, "Logging in");

        match self.try_login(username_or_email, password).await {
            Ok(message) => {
                self.fsm.try_transition(&SessionMachineInput::LoginSuccess);
                info!("Login successful");
                Ok(message)
            }
            Err(e) => {
                self.fsm.try_transition(&SessionMachineInput::LoginFailed);
                warn!(error = %e, "Login failed");
                Err(e)
            }
        }
    }

    async fn try_login(&self, username_or_email: &str, password: &str) -> AuthResult<String> {
        let request = LoginRequest {
            username_or_email,
            password,
            user_agent: &self.user_agent,
        };
        let options = RequestOptions::post(serde_json::to_value(&request)?);

        let response = match self
            .requests
            .request_with_status(&self.endpoints.login(), &options, true)
            .await
        {
            Ok(response) => response,
            Err(AuthError::RequestFailed { status: 401, body }) => {
                let message = message_of(&body).unwrap_or("Invalid credentials");
                return Err(AuthError::InvalidCredentials(message.to_string()));
            }
            Err(e) => return Err(classify_failure(e)),
        };

        response.ensure_success()?;
        let pair: TokenPair = extract_payload(&response.body)?;
        self.tokens
            .set_tokens(&pair.access_token, &pair.refresh_token)?;

        Ok(message_of(&response.body).unwrap_or("Logged in").to_string())
    }

    /// Create an account. Does not log in. Returns the server message.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<String> {
        validate_registration(username, email, password)?;
        info!(username = %username, "Registering account");

        let request = RegisterRequest {
            username,
            email,
            password,
        };
        let options = RequestOptions::post(serde_json::to_value(&request)?);

        let response = self
            .requests
            .request_with_status(&self.endpoints.register(), &options, true)
            .await
            .map_err(classify_failure)?;
        response.ensure_success()?;

        Ok(message_of(&response.body).unwrap_or("Registered").to_string())
    }

    /// Revoke the refresh token on the server and clear local tokens.
    ///
    /// Local tokens are cleared even when the server call fails.
    pub async fn logout(&self) -> AuthResult<()> {
        self.fsm.try_transition(&SessionMachineInput::LogoutRequested);

        match self.tokens.get_refresh_token() {
            Ok(Some(refresh_token)) => {
                if let Err(e) = self.revoke_on_server(&refresh_token).await {
                    warn!(error = %e, "Server logout failed, clearing local session anyway");
                }
            }
            Ok(None) => debug!("No refresh token stored, skipping server logout"),
            Err(e) => warn!(error = %e, "Failed to read refresh token"),
        }

        let cleared = self.tokens.clear();
        self.fsm.try_transition(&SessionMachineInput::LogoutComplete);
        cleared?;

        info!("Logged out");
        Ok(())
    }

    async fn revoke_on_server(&self, refresh_token: &str) -> AuthResult<()> {
        let options =
            RequestOptions::post(serde_json::to_value(RefreshTokenRequest::new(refresh_token))?);
        self.requests
            .request(&self.endpoints.logout(), &options)
            .await
            .map_err(classify_failure)?;
        Ok(())
    }

    /// Fetch the profile of the logged-in user.
    pub async fn me(&self) -> AuthResult<UserProfile> {
        let response = self
            .refresher
            .send_authorized_with_status(Method::GET, self.endpoints.me(), None)
            .await
            .map_err(|e| self.on_protected_error(e))?;
        response.ensure_success()?;
        extract_payload(&response.body)
    }

    /// Rotate the token pair with the stored refresh token.
    pub async fn refresh_now(&self) -> AuthResult<()> {
        self.refresher
            .refresh_now()
            .await
            .map_err(|e| self.on_protected_error(e))?;
        Ok(())
    }

    /// Drop local tokens after the session became unusable.
    pub fn clear_session(&self) -> AuthResult<()> {
        self.tokens.clear()?;
        self.fsm.try_transition(&SessionMachineInput::SessionLost);
        Ok(())
    }

    fn on_protected_error(&self, err: AuthError) -> AuthError {
        if matches!(err, AuthError::Unauthenticated) {
            self.fsm.try_transition(&SessionMachineInput::SessionLost);
        }
        err
    }
}
