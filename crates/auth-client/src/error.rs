//! Authentication error types.

use serde_json::Value;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The CSRF endpoint did not hand out a token
    #[error("Failed to fetch CSRF token: {0}")]
    CsrfFetch(String),

    /// The server rejected the CSRF token again after a fresh one was fetched
    #[error("CSRF token rejected (HTTP {status})")]
    CsrfRejected { status: u16, body: Value },

    /// No usable session; the user has to log in
    #[error("Not logged in")]
    Unauthenticated,

    /// The refresh token was not accepted
    #[error("Token refresh failed (HTTP {status}): {message}")]
    RefreshFailed { status: u16, message: String },

    /// Non-success response that no retry path could recover
    #[error("Request failed (HTTP {status}): {}", body_message(.body))]
    RequestFailed { status: u16, body: Value },

    /// A success response whose body did not have the expected shape
    #[error("Invalid response body: {0}")]
    InvalidResponseBody(String),

    /// Invalid username/email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Structured error envelope from the server
    #[error("{message} ({code})")]
    Api {
        status: u16,
        code: String,
        message: String,
        details: Option<String>,
    },

    /// Input rejected before any request was made
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] token_store::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token not usable as a header value
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] gram_config::CoreError),
}

fn body_message(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

impl AuthError {
    /// Returns true if the stored session is unusable and the user must log in again.
    pub fn is_reauth_required(&self) -> bool {
        matches!(
            self,
            AuthError::Unauthenticated | AuthError::RefreshFailed { .. }
        )
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors are connection failures, timeouts and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            AuthError::RequestFailed { status, .. } | AuthError::Api { status, .. } => {
                *status >= 500
            }
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::CsrfRejected { status, .. }
            | AuthError::RefreshFailed { status, .. }
            | AuthError::RequestFailed { status, .. }
            | AuthError::Api { status, .. } => Some(*status),
            AuthError::Unauthenticated => Some(401),
            AuthError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reauth_required() {
        assert!(AuthError::Unauthenticated.is_reauth_required());
        assert!(AuthError::RefreshFailed {
            status: 401,
            message: "expired".to_string()
        }
        .is_reauth_required());
        assert!(!AuthError::CsrfFetch("down".to_string()).is_reauth_required());
        assert!(!AuthError::RequestFailed {
            status: 401,
            body: json!({})
        }
        .is_reauth_required());
    }

    #[test]
    fn test_is_transient_server_error() {
        let err = AuthError::RequestFailed {
            status: 503,
            body: json!({"message": "unavailable"}),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_is_not_transient_client_error() {
        let err = AuthError::RequestFailed {
            status: 404,
            body: json!({"message": "not found"}),
        };
        assert!(!err.is_transient());
        assert!(!AuthError::InvalidCredentials("bad password".to_string()).is_transient());
    }

    #[test]
    fn test_request_failed_display_uses_message() {
        let err = AuthError::RequestFailed {
            status: 500,
            body: json!({"message": "Invalid JSON response"}),
        };
        assert_eq!(
            err.to_string(),
            "Request failed (HTTP 500): Invalid JSON response"
        );

        let err = AuthError::RequestFailed {
            status: 418,
            body: json!({"teapot": true}),
        };
        assert_eq!(err.to_string(), "Request failed (HTTP 418): {\"teapot\":true}");
    }

    #[test]
    fn test_status() {
        assert_eq!(AuthError::Unauthenticated.status(), Some(401));
        assert_eq!(
            AuthError::CsrfRejected {
                status: 403,
                body: json!({})
            }
            .status(),
            Some(403)
        );
        assert_eq!(AuthError::CsrfFetch("x".to_string()).status(), None);
    }
}
