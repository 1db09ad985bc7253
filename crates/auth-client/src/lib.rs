//! Session client for the gram auth server.
//!
//! This crate provides:
//! - CSRF token fetching and caching with a single retry on 403
//! - Bearer-authenticated requests with refresh-token rotation on 401
//! - Single-flight refresh shared by concurrent requests
//! - Account operations (login, register, logout, profile)
//! - Explicit FSM-based session state

mod auth_fsm;
mod csrf;
mod endpoints;
pub mod envelope;
mod error;
mod refresher;
mod request;
mod session;
pub mod validation;

pub use auth_fsm::session_machine;
pub use auth_fsm::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionState, SessionStateMachine,
};
pub use csrf::{CsrfProvider, CsrfState};
pub use endpoints::Endpoints;
pub use envelope::{
    ApiErrorResponse, ApiResponse, ErrorDetail, SuccessResponse, TokenPair, UserProfile, INVALID_JSON_MESSAGE,
    UNEXPECTED_RESPONSE,
};
pub use error::{AuthError, AuthResult};
pub use refresher::SessionRefresher;
pub use request::{RequestClient, RequestOptions, CSRF_HEADER};
pub use session::{AuthSession, DEFAULT_USER_AGENT};
