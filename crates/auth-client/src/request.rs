//! CSRF-protected requests to the auth server.

use crate::envelope::{parse_body, summarize_body, ApiResponse};
use crate::{AuthError, AuthResult, CsrfProvider, Endpoints};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Method, extra headers and JSON body of a request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Merged over the defaults; these win on conflict.
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Sends requests with the CSRF header and recovers once from a 403.
pub struct RequestClient {
    http_client: Client,
    endpoints: Arc<Endpoints>,
    csrf: Arc<CsrfProvider>,
}

impl RequestClient {
    pub fn new(http_client: Client, endpoints: Arc<Endpoints>, csrf: Arc<CsrfProvider>) -> Self {
        Self {
            http_client,
            endpoints,
            csrf,
        }
    }

    pub fn csrf(&self) -> &Arc<CsrfProvider> {
        &self.csrf
    }

    /// Send a request, retrying once with a fresh CSRF token on 403.
    pub async fn request(&self, path: &str, options: &RequestOptions) -> AuthResult<Value> {
        self.request_with_retry(path, options, true).await
    }

    /// Send a request. With `allow_csrf_retry`, a 403 triggers one CSRF
    /// re-fetch and one resend; a 403 that cannot be retried is
    /// [`AuthError::CsrfRejected`].
    ///
    /// Bodies that are not JSON come back as `{"message": "Invalid JSON response"}`.
    pub async fn request_with_retry(
        &self,
        path: &str,
        options: &RequestOptions,
        allow_csrf_retry: bool,
    ) -> AuthResult<Value> {
        Ok(self
            .request_with_status(path, options, allow_csrf_retry)
            .await?
            .body)
    }

    /// Like [`request_with_retry`](Self::request_with_retry), keeping the
    /// final status.
    pub async fn request_with_status(
        &self,
        path: &str,
        options: &RequestOptions,
        allow_csrf_retry: bool,
    ) -> AuthResult<ApiResponse> {
        let url = self.endpoints.resolve(path)?;
        let mut retry_left = allow_csrf_retry;

        loop {
            let token = self.csrf.token().await?;
            let response = self.send(url.clone(), options, &token).await?;
            let status = response.status();

            if status == StatusCode::FORBIDDEN && retry_left {
                info!(path = %path, "CSRF token rejected, refreshing and retrying");
                retry_left = false;
                self.csrf.refresh(&token).await?;
                continue;
            }

            let body = read_body(response).await;

            if status == StatusCode::FORBIDDEN {
                warn!(path = %path, "CSRF token rejected after retry");
                return Err(AuthError::CsrfRejected {
                    status: status.as_u16(),
                    body,
                });
            }

            if !status.is_success() {
                debug!(path = %path, status = %status, "Request failed");
                return Err(AuthError::RequestFailed {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(ApiResponse {
                status: status.as_u16(),
                body,
            });
        }
    }

    async fn send(
        &self,
        url: url::Url,
        options: &RequestOptions,
        csrf_token: &str,
    ) -> AuthResult<Response> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(CSRF_HEADER),
            HeaderValue::from_str(csrf_token)?,
        );
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        debug!(method = %options.method, url = %url, "Sending request");

        let mut builder = self
            .http_client
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        Ok(builder.send().await?)
    }
}

/// Read a response body as JSON, substituting the placeholder on failure.
pub(crate) async fn read_body(response: Response) -> Value {
    match response.text().await {
        Ok(text) => {
            debug!(body = %summarize_body(&text), "Received response body");
            parse_body(&text)
        }
        Err(e) => {
            warn!(error = %e, "Failed to read response body");
            parse_body("")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use serde_json::json;

    #[test]
    fn test_request_options() {
        let options = RequestOptions::get();
        assert_eq!(options.method, Method::GET);
        assert!(options.body.is_none());

        let options = RequestOptions::post(json!({"a": 1}))
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.body, Some(json!({"a": 1})));
        assert_eq!(options.headers.get(AUTHORIZATION).unwrap(), "Bearer x");
    }
}
