//! Poll Function contract
//!
//! A poller performs exactly one remote read per call and reports what it saw.
//! It closes over the resource identity and the read capability it needs, so
//! the engine never learns what kind of resource it is waiting on.

use super::error::PollError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Lifecycle phase reported by the remote system (e.g. "Updating", "Succeeded")
pub type StateLabel = String;

/// Outcome of `Poller::poll`
pub type PollResult<T> = std::result::Result<Observation<T>, PollError>;

/// What a single remote read observed
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// The object exists and reported a lifecycle state
    Present { object: T, state: StateLabel },
    /// The object exists but its state field was empty
    Unlabelled { object: T },
    /// The object does not exist
    Absent,
}

impl<T> Observation<T> {
    pub fn present(object: T, state: impl Into<StateLabel>) -> Self {
        Self::Present {
            object,
            state: state.into(),
        }
    }

    pub fn unlabelled(object: T) -> Self {
        Self::Unlabelled { object }
    }

    pub fn absent() -> Self {
        Self::Absent
    }

    /// Build an observation from an optional state field
    pub fn from_state(object: T, state: Option<impl Into<StateLabel>>) -> Self {
        match state {
            Some(state) => Self::present(object, state),
            None => Self::unlabelled(object),
        }
    }

    pub fn state(&self) -> ObservedState {
        match self {
            Self::Present { state, .. } => ObservedState::Label(state.clone()),
            Self::Unlabelled { .. } => ObservedState::Unlabelled,
            Self::Absent => ObservedState::Absent,
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            Self::Present { object, .. } | Self::Unlabelled { object } => Some(object),
            Self::Absent => None,
        }
    }

    pub fn into_object(self) -> Option<T> {
        match self {
            Self::Present { object, .. } | Self::Unlabelled { object } => Some(object),
            Self::Absent => None,
        }
    }
}

/// Object-free summary of an observation, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum ObservedState {
    Label(StateLabel),
    Unlabelled,
    Absent,
}

impl ObservedState {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Label(label) => Some(label),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObservedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservedState::Label(label) => write!(f, "{:?}", label),
            ObservedState::Unlabelled => write!(f, "<no state>"),
            ObservedState::Absent => write!(f, "<absent>"),
        }
    }
}

/// One remote read of a resource's lifecycle state
#[async_trait]
pub trait Poller: Send + Sync {
    /// Remote representation handed back to the caller on success
    type Object: Send;

    async fn poll(&self) -> PollResult<Self::Object>;
}

/// Poller backed by an async closure
pub struct PollFn<F> {
    f: F,
}

/// Wrap an async closure as a `Poller`
///
/// ```ignore
/// let poller = poll_fn(|| async { Ok(Observation::present(json!({}), "Succeeded")) });
/// ```
pub fn poll_fn<F, Fut, T>(f: F) -> PollFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = PollResult<T>> + Send + 'static,
    T: Send,
{
    PollFn { f }
}

#[async_trait]
impl<F, Fut, T> Poller for PollFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = PollResult<T>> + Send + 'static,
    T: Send,
{
    type Object = T;

    async fn poll(&self) -> PollResult<T> {
        (self.f)().await
    }
}
