//! Session lifecycle state machine.
//!
//! ```text
//! Disconnected ──ConnectRequested──▶ Connecting ──TransportConnected──▶ Connected
//!                                        │                                 │
//!                                        └──ConnectFailed──┐               ├─ TransportClosed ─▶ Connected
//!                                                          ▼               │
//!                                                     Terminated ◀─────────┴─ CloseRequested
//!                                                                             TransportError
//!                                                                             ShutdownRequested
//! ```
//!
//! A transport close without an error keeps the session `Connected`: it is
//! logged, reading stops, and the session ends only on shutdown.  A transport
//! error is always terminal.

use std::fmt;

use thiserror::Error;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Terminated,
}

/// Inputs that drive [`SessionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ConnectRequested,
    TransportConnected,
    ConnectFailed,
    /// The host sent `closePlugin` for this plugin.
    CloseRequested,
    TransportError,
    /// The peer closed the stream without an error.
    TransportClosed,
    ShutdownRequested,
}

/// A lifecycle event that is not valid in the current state.
#[derive(Debug, Error, PartialEq)]
#[error("invalid session transition: {event:?} while {from}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub event: LifecycleEvent,
}

impl SessionState {
    /// Returns the state after `event`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for events that cannot happen in the
    /// current state (for example anything after `Terminated`).
    pub fn on(self, event: LifecycleEvent) -> Result<SessionState, InvalidTransition> {
        use LifecycleEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Disconnected, E::ConnectRequested) => Ok(S::Connecting),
            (S::Connecting, E::TransportConnected) => Ok(S::Connected),
            (S::Connecting, E::ConnectFailed) => Ok(S::Terminated),
            (S::Connected, E::TransportClosed) => Ok(S::Connected),
            (S::Connected, E::CloseRequested | E::TransportError | E::ShutdownRequested) => {
                Ok(S::Terminated)
            }
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidTransition, LifecycleEvent as E, SessionState as S};

    #[test]
    fn test_happy_path_reaches_connected() {
        let state = S::Disconnected
            .on(E::ConnectRequested)
            .and_then(|s| s.on(E::TransportConnected))
            .unwrap();
        assert_eq!(state, S::Connected);
    }

    #[test]
    fn test_connected_terminates_on_close_error_or_shutdown() {
        for event in [E::CloseRequested, E::TransportError, E::ShutdownRequested] {
            assert_eq!(S::Connected.on(event), Ok(S::Terminated), "{event:?}");
        }
    }

    #[test]
    fn test_transport_close_keeps_session_connected() {
        assert_eq!(S::Connected.on(E::TransportClosed), Ok(S::Connected));
    }

    #[test]
    fn test_connect_failure_is_terminal() {
        assert_eq!(S::Connecting.on(E::ConnectFailed), Ok(S::Terminated));
    }

    #[test]
    fn test_terminated_accepts_nothing() {
        let result = S::Terminated.on(E::ConnectRequested);
        assert_eq!(
            result,
            Err(InvalidTransition {
                from: S::Terminated,
                event: E::ConnectRequested,
            })
        );
        assert!(S::Terminated.is_terminal());
    }

    #[test]
    fn test_messages_cannot_close_before_connect() {
        assert!(S::Disconnected.on(E::CloseRequested).is_err());
        assert!(S::Connecting.on(E::TransportClosed).is_err());
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(S::Connecting.to_string(), "connecting");
    }
}
