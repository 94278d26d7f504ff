//! Convergence error taxonomy

use super::poll::ObservedState;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Classification of a failed remote read
///
/// Sessions decide per kind whether a failure ends the wait or counts as
/// "still in progress". `NotFound` is governed by the session's absence
/// policy; everything else is fatal unless explicitly tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollErrorKind {
    /// The remote object does not exist
    NotFound,
    /// The remote API asked us to slow down
    Throttled,
    /// The remote API rejected the read because of a conflicting operation
    Conflict,
    /// Any other error status from the remote API
    Api,
    /// The request never produced a response
    Transport,
    /// The response could not be understood
    Decode,
}

impl std::fmt::Display for PollErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollErrorKind::NotFound => write!(f, "not found"),
            PollErrorKind::Throttled => write!(f, "throttled"),
            PollErrorKind::Conflict => write!(f, "conflict"),
            PollErrorKind::Api => write!(f, "api"),
            PollErrorKind::Transport => write!(f, "transport"),
            PollErrorKind::Decode => write!(f, "decode"),
        }
    }
}

/// A failed remote read, as reported by a poller
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct PollError {
    kind: PollErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PollError {
    pub fn new(kind: PollErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PollErrorKind::NotFound, message)
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(PollErrorKind::Throttled, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(PollErrorKind::Api, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(PollErrorKind::Transport, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(PollErrorKind::Decode, message)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> PollErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == PollErrorKind::NotFound
    }
}

/// Why a convergence session ended without reaching a target state
#[derive(Error, Debug)]
pub enum ConvergeError {
    /// The session was configured in a way that can never work
    #[error("invalid convergence configuration: {0}")]
    Configuration(String),

    /// A remote read failed and the session does not tolerate that failure
    #[error("polling {resource} failed after {polls} poll(s): {source}")]
    Poll {
        resource: String,
        polls: u32,
        #[source]
        source: PollError,
    },

    /// The remote object reported a state outside both pending and target sets
    #[error("{resource} reported unexpected state {observed} (expected {expected})")]
    UnexpectedState {
        resource: String,
        observed: ObservedState,
        expected: String,
        polls: u32,
        last_object: Option<serde_json::Value>,
    },

    /// The deadline passed while the object was still pending
    #[error(
        "timed out after {elapsed:?} waiting for {resource} (last state: {})",
        describe_last(.last_state)
    )]
    Timeout {
        resource: String,
        elapsed: Duration,
        polls: u32,
        last_state: Option<ObservedState>,
        last_object: Option<serde_json::Value>,
    },

    /// An external cancellation preempted the wait
    #[error("waiting for {resource} was cancelled after {polls} poll(s)")]
    Cancelled {
        resource: String,
        polls: u32,
        last_state: Option<ObservedState>,
    },
}

impl ConvergeError {
    /// Number of remote reads performed before the session ended
    pub fn polls(&self) -> u32 {
        match self {
            ConvergeError::Configuration(_) => 0,
            ConvergeError::Poll { polls, .. }
            | ConvergeError::UnexpectedState { polls, .. }
            | ConvergeError::Timeout { polls, .. }
            | ConvergeError::Cancelled { polls, .. } => *polls,
        }
    }

    /// Last state the session saw, if any
    pub fn last_state(&self) -> Option<&ObservedState> {
        match self {
            ConvergeError::UnexpectedState { observed, .. } => Some(observed),
            ConvergeError::Timeout { last_state, .. }
            | ConvergeError::Cancelled { last_state, .. } => last_state.as_ref(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConvergeError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvergeError::Cancelled { .. })
    }
}

fn describe_last(last: &Option<ObservedState>) -> String {
    match last {
        Some(state) => state.to_string(),
        None => "never observed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_error_display_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = PollError::transport("GET redis/cache1").with_source(io);
        assert_eq!(err.to_string(), "transport: GET redis/cache1");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_timeout_message_names_resource_and_state() {
        let err = ConvergeError::Timeout {
            resource: "redis cache cache1".to_string(),
            elapsed: Duration::from_secs(5),
            polls: 6,
            last_state: Some(ObservedState::Label("Updating".to_string())),
            last_object: None,
        };
        let message = err.to_string();
        assert!(message.contains("redis cache cache1"));
        assert!(message.contains("\"Updating\""));
        assert_eq!(err.polls(), 6);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_timeout_without_observation() {
        let err = ConvergeError::Timeout {
            resource: "vault".to_string(),
            elapsed: Duration::ZERO,
            polls: 0,
            last_state: None,
            last_object: None,
        };
        assert!(err.to_string().contains("never observed"));
        assert_eq!(err.last_state(), None);
    }
}
