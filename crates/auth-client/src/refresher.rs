//! Bearer-authenticated requests with refresh-token rotation on 401.

use crate::auth_fsm::{SessionMachineInput, SessionStateMachine};
use crate::envelope::{extract_payload, message_of, ApiResponse, TokenPair};
use crate::request::read_body;
use crate::{AuthError, AuthResult, Endpoints};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use token_store::TokenStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Body of refresh and logout requests.
#[derive(Debug, Serialize)]
pub(crate) struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
    token_type: &'static str,
}

impl<'a> RefreshTokenRequest<'a> {
    pub(crate) fn new(refresh_token: &'a str) -> Self {
        Self {
            refresh_token,
            token_type: "Bearer",
        }
    }
}

/// A refresh token the server refused, with the answer it gave.
#[derive(Debug, Clone)]
struct RejectedRefresh {
    refresh_token: String,
    status: u16,
    message: String,
}

impl RejectedRefresh {
    fn to_error(&self) -> AuthError {
        AuthError::RefreshFailed {
            status: self.status,
            message: self.message.clone(),
        }
    }
}

/// Sends protected requests and rotates the token pair when the access
/// token is rejected.
pub struct SessionRefresher {
    http_client: Client,
    endpoints: Arc<Endpoints>,
    tokens: Arc<TokenStore>,
    fsm: Arc<SessionStateMachine>,
    /// Held for the whole refresh exchange so only one is outstanding.
    /// Remembers the last refresh token the server refused.
    refresh_lock: Mutex<Option<RejectedRefresh>>,
}

impl SessionRefresher {
    pub fn new(
        http_client: Client,
        endpoints: Arc<Endpoints>,
        tokens: Arc<TokenStore>,
        fsm: Arc<SessionStateMachine>,
    ) -> Self {
        Self {
            http_client,
            endpoints,
            tokens,
            fsm,
            refresh_lock: Mutex::new(None),
        }
    }

    /// GET a protected resource.
    pub async fn load_protected_resource(&self, path: &str) -> AuthResult<Value> {
        self.send_authorized(Method::GET, path, None).await
    }

    /// Send a request with the stored access token.
    ///
    /// On 401 the token pair is refreshed, persisted, and the request is
    /// sent once more. A second failure is [`AuthError::RequestFailed`].
    pub async fn send_authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> AuthResult<Value> {
        Ok(self.send_authorized_with_status(method, path, body).await?.body)
    }

    /// Like [`send_authorized`](Self::send_authorized), keeping the final status.
    pub async fn send_authorized_with_status(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> AuthResult<ApiResponse> {
        let access_token = self
            .tokens
            .get_access_token()?
            .ok_or(AuthError::Unauthenticated)?;

        let response = self
            .send_bearer(method.clone(), path, body, &access_token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return finish(response).await;
        }

        info!(path = %path, "Access token rejected, refreshing session");
        let access_token = self.refresh_after_rejection(&access_token).await?;

        let response = self
            .send_bearer(method, path, body, &access_token)
            .await?;
        finish(response).await
    }

    /// Rotate the token pair now, regardless of the access token's state.
    pub async fn refresh_now(&self) -> AuthResult<TokenPair> {
        let mut last_rejected = self.refresh_lock.lock().await;
        self.refresh_locked(&mut last_rejected).await
    }

    async fn refresh_after_rejection(&self, rejected: &str) -> AuthResult<String> {
        let mut last_rejected = self.refresh_lock.lock().await;

        // Another request may have rotated the pair while we waited.
        if let Some(current) = self.tokens.get_access_token()? {
            if current != rejected {
                debug!("Session already refreshed by another request");
                return Ok(current);
            }
        }

        let pair = self.refresh_locked(&mut last_rejected).await?;
        Ok(pair.access_token)
    }

    async fn refresh_locked(
        &self,
        last_rejected: &mut Option<RejectedRefresh>,
    ) -> AuthResult<TokenPair> {
        let refresh_token = self
            .tokens
            .get_refresh_token()?
            .ok_or(AuthError::Unauthenticated)?;

        // The server already refused this token; waiters share that answer.
        if let Some(rejected) = last_rejected
            .as_ref()
            .filter(|rejected| rejected.refresh_token == refresh_token)
        {
            debug!("Refresh token already rejected, not retrying");
            return Err(rejected.to_error());
        }

        self.fsm.try_transition(&SessionMachineInput::RefreshStarted);

        let result = match self.exchange_refresh_token(&refresh_token).await {
            Ok(pair) => self
                .tokens
                .set_tokens(&pair.access_token, &pair.refresh_token)
                .map(|_| pair)
                .map_err(AuthError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(pair) => {
                *last_rejected = None;
                self.fsm
                    .try_transition(&SessionMachineInput::RefreshSucceeded);
                info!("Session tokens rotated");
                Ok(pair)
            }
            Err(e) => {
                if let AuthError::RefreshFailed { status, message } = &e {
                    *last_rejected = Some(RejectedRefresh {
                        refresh_token,
                        status: *status,
                        message: message.clone(),
                    });
                }
                self.fsm.try_transition(&SessionMachineInput::RefreshFailed);
                warn!(error = %e, "Session refresh failed");
                Err(e)
            }
        }
    }

    /// POST the refresh token; the store is left untouched.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let url = self.endpoints.resolve(&self.endpoints.refresh())?;
        debug!(url = %url, "Exchanging refresh token");

        let response = self
            .http_client
            .post(url)
            .json(&RefreshTokenRequest::new(refresh_token))
            .send()
            .await?;

        let status = response.status();
        let body = read_body(response).await;

        if !status.is_success() {
            return Err(AuthError::RefreshFailed {
                status: status.as_u16(),
                message: message_of(&body).unwrap_or("refresh rejected").to_string(),
            });
        }

        if body.get("success") == Some(&Value::Bool(false)) {
            return Err(AuthError::RefreshFailed {
                status: status.as_u16(),
                message: message_of(&body)
                    .unwrap_or("success=false on 2XX response")
                    .to_string(),
            });
        }

        extract_payload(&body).map_err(|e| {
            warn!(error = %e, "Refresh response carried no token pair");
            AuthError::RefreshFailed {
                status: status.as_u16(),
                message: "refresh response carried no token pair".to_string(),
            }
        })
    }

    async fn send_bearer(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        access_token: &str,
    ) -> AuthResult<Response> {
        let url = self.endpoints.resolve(path)?;
        let mut authorization = HeaderValue::from_str(&format!("Bearer {access_token}"))?;
        authorization.set_sensitive(true);

        debug!(method = %method, url = %url, "Sending authorized request");

        let mut builder = self
            .http_client
            .request(method, url)
            .header(AUTHORIZATION, authorization);
        if let Some(body) = body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        Ok(builder.send().await?)
    }
}

async fn finish(response: Response) -> AuthResult<ApiResponse> {
    let status = response.status();
    let body = read_body(response).await;
    if !status.is_success() {
        return Err(AuthError::RequestFailed {
            status: status.as_u16(),
            body,
        });
    }
    Ok(ApiResponse {
        status: status.as_u16(),
        body,
    })
}
