//! Shared helpers for the mock-server tests.

#![allow(dead_code)]

use auth_client::AuthSession;
use gram_config::Config;
use serde_json::{json, Value};
use token_store::{MemoryStorage, TokenStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn config_for(server: &MockServer) -> Config {
    Config {
        auth_server_url: server.uri(),
        ..Config::default()
    }
}

pub fn memory_tokens() -> TokenStore {
    TokenStore::new(Box::new(MemoryStorage::new()))
}

pub fn logged_in_tokens(access: &str, refresh: &str) -> TokenStore {
    let tokens = memory_tokens();
    tokens.set_tokens(access, refresh).unwrap();
    tokens
}

pub fn session_for(server: &MockServer, tokens: TokenStore) -> AuthSession {
    AuthSession::new(&config_for(server), tokens).unwrap()
}

pub fn csrf_body(token: &str) -> Value {
    json!({
        "success": true,
        "message": "CSRF token issued",
        "data": {"csrf_token": token}
    })
}

pub fn token_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer"
    })
}

/// Serve `token` from the CSRF endpoint, expecting `times` fetches.
pub async fn mount_csrf(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/auth/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(csrf_body(token)))
        .expect(times)
        .mount(server)
        .await;
}
