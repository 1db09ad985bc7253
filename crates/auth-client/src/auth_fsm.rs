//! Session state machine using rust-fsm.
//!
//! The token store stays the source of truth for whether a session exists;
//! the machine tracks what the client is doing with it.
//!
//! ## Transitions
//!
//! ```text
//! Unauthenticated --SessionRestored--> Authenticated
//! Unauthenticated --LoginAttempt-----> LoggingIn --LoginSuccess--> Authenticated
//!                                      LoggingIn --LoginFailed---> Unauthenticated
//! Authenticated ----RefreshStarted---> Refreshing --RefreshSucceeded--> Authenticated
//!                                      Refreshing --RefreshFailed-----> Unauthenticated
//! Authenticated ----LogoutRequested--> LoggingOut --LogoutComplete----> Unauthenticated
//! Authenticated ----SessionLost------> Unauthenticated
//! ```

use crate::{AuthError, AuthResult};
use parking_lot::Mutex;
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        SessionRestored => Authenticated,
        LoginAttempt => LoggingIn,
        LogoutRequested => LoggingOut
    },
    LoggingIn => {
        LoginSuccess => Authenticated,
        LoginFailed => Unauthenticated
    },
    Authenticated => {
        LoginAttempt => LoggingIn,
        RefreshStarted => Refreshing,
        LogoutRequested => LoggingOut,
        SessionLost => Unauthenticated
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        RefreshFailed => Unauthenticated
    },
    LoggingOut => {
        LogoutComplete => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for display and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    LoggingIn,
    Authenticated,
    Refreshing,
    LoggingOut,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::LoggingIn => "logging_in",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
            SessionState::LoggingOut => "logging_out",
        }
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
            SessionMachineState::LoggingIn => SessionState::LoggingIn,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::Refreshing => SessionState::Refreshing,
            SessionMachineState::LoggingOut => SessionState::LoggingOut,
        }
    }
}

/// Shared, lock-protected session machine.
pub struct SessionStateMachine {
    fsm: Mutex<SessionMachine>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            fsm: Mutex::new(SessionMachine::new()),
        }
    }

    /// Start in `Authenticated` when tokens are already stored.
    pub fn restored(has_session: bool) -> Self {
        let machine = Self::new();
        if has_session {
            machine.try_transition(&SessionMachineInput::SessionRestored);
        }
        machine
    }

    pub fn state(&self) -> SessionState {
        SessionState::from(self.fsm.lock().state())
    }

    /// Apply an input, failing if the current state does not accept it.
    pub fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let mut fsm = self.fsm.lock();
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
        }

        Ok(new_state)
    }

    /// Apply an input if the current state accepts it.
    ///
    /// Protocol paths use this so that a call made in an unexpected state
    /// still reaches the server.
    pub fn try_transition(&self, input: &SessionMachineInput) -> Option<SessionState> {
        match self.transition(input) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!(error = %e, "Ignoring session state input");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_unauthenticated() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_login_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggingIn);

        machine.consume(&SessionMachineInput::LoginSuccess).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_login_failure_returns_to_unauthenticated() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        machine.consume(&SessionMachineInput::LoginFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_refresh_flow() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SessionRestored).unwrap();

        machine.consume(&SessionMachineInput::RefreshStarted).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Refreshing);

        machine.consume(&SessionMachineInput::RefreshSucceeded).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);

        machine.consume(&SessionMachineInput::RefreshStarted).unwrap();
        machine.consume(&SessionMachineInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_cannot_refresh_without_session() {
        let mut machine = SessionMachine::new();
        assert!(machine.consume(&SessionMachineInput::RefreshStarted).is_err());
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_logout_flow() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SessionRestored).unwrap();

        machine.consume(&SessionMachineInput::LogoutRequested).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggingOut);

        machine.consume(&SessionMachineInput::LogoutComplete).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_state_machine_wrapper() {
        let machine = SessionStateMachine::restored(true);
        assert_eq!(machine.state(), SessionState::Authenticated);

        assert!(matches!(
            machine.transition(&SessionMachineInput::LoginSuccess),
            Err(AuthError::InvalidStateTransition(_))
        ));
        assert_eq!(machine.try_transition(&SessionMachineInput::LoginSuccess), None);
        assert_eq!(machine.state(), SessionState::Authenticated);

        assert_eq!(
            machine.try_transition(&SessionMachineInput::SessionLost),
            Some(SessionState::Unauthenticated)
        );
        assert!(!SessionStateMachine::restored(false).state().is_authenticated());
    }

    #[test]
    fn test_session_state_serialization() {
        let json = serde_json::to_string(&SessionState::LoggingOut).unwrap();
        assert_eq!(json, "\"logging_out\"");
        assert_eq!(SessionState::LoggingOut.as_str(), "logging_out");
    }
}
