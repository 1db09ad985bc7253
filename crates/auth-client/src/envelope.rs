//! Response envelopes of the auth server and helpers to pick them apart.

use crate::{AuthError, AuthResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Body substituted when a response cannot be parsed as JSON.
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON response";

/// Error code for a 2xx response that still reports `success: false`.
pub const UNEXPECTED_RESPONSE: &str = "UNEXPECTED_RESPONSE";

/// Maximum length of error details copied out of a raw body.
const DETAILS_MAX_CHARS: usize = 100;

/// `{success: true, message, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Machine-readable part of an error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    #[serde(default)]
    pub details: Option<Value>,
}

/// `{success: false, message, error: {code, details}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub success: bool,
    pub message: String,
    pub error: ErrorDetail,
}

impl ApiErrorResponse {
    fn into_error(self, status: u16) -> AuthError {
        let details = self.error.details.map(|details| match details {
            Value::String(s) => s,
            other => other.to_string(),
        });
        AuthError::Api {
            status,
            code: self.error.code,
            message: self.message,
            details,
        }
    }
}

/// Access/refresh token pair issued by login and refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .finish()
    }
}

/// Profile returned by the `me` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Successful response status with its parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// [`ensure_success`] with this response's status.
    pub fn ensure_success(&self) -> AuthResult<()> {
        ensure_success(self.status, &self.body)
    }
}

/// Placeholder body for unparsable responses.
pub fn invalid_json_body() -> Value {
    json!({ "message": INVALID_JSON_MESSAGE })
}

/// Parse a raw response body, degrading to the placeholder.
pub fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| invalid_json_body())
}

/// Top-level `message` of a body, if it has one.
pub fn message_of(body: &Value) -> Option<&str> {
    body.get("message").and_then(Value::as_str)
}

/// Reject a 2xx body that carries `success: false`.
pub fn ensure_success(status: u16, body: &Value) -> AuthResult<()> {
    if body.get("success") == Some(&Value::Bool(false)) {
        return Err(AuthError::Api {
            status,
            code: UNEXPECTED_RESPONSE.to_string(),
            message: "Unexpected success=false on 2XX response.".to_string(),
            details: Some(truncate_details(&body.to_string())),
        });
    }
    Ok(())
}

/// Decode the payload of a success body.
///
/// The payload is taken from `data` when present, otherwise from the body
/// itself (refresh and profile responses are not enveloped).
pub fn extract_payload<T: DeserializeOwned>(body: &Value) -> AuthResult<T> {
    if let Some(data) = body.get("data").filter(|data| !data.is_null()) {
        if let Ok(payload) = serde_json::from_value(data.clone()) {
            return Ok(payload);
        }
    }
    serde_json::from_value(body.clone()).map_err(|e| AuthError::InvalidResponseBody(e.to_string()))
}

/// Turn a structured error body into [`AuthError::Api`], leaving anything else alone.
pub fn classify_failure(err: AuthError) -> AuthError {
    match err {
        AuthError::RequestFailed { status, body } => {
            match serde_json::from_value::<ApiErrorResponse>(body.clone()) {
                Ok(envelope) => envelope.into_error(status),
                Err(_) => AuthError::RequestFailed { status, body },
            }
        }
        other => other,
    }
}

/// Cut error details down to a readable size.
pub fn truncate_details(details: &str) -> String {
    if details.chars().count() <= DETAILS_MAX_CHARS {
        return details.to_string();
    }
    let truncated: String = details.chars().take(DETAILS_MAX_CHARS).collect();
    format!("{truncated}...")
}

/// Log-safe fingerprint of a body that may carry tokens.
pub(crate) fn summarize_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}
