//! Convergence Engine
//!
//! Polls a remote resource until it reports a target state, the deadline
//! passes, or the caller cancels. The engine only observes: it never issues
//! or repeats a mutation, so a failed session can never cause a duplicate
//! write.

use super::clock::{Clock, TokioClock};
use super::error::ConvergeError;
use super::poll::{Observation, ObservedState, Poller};
use super::policy::{Classifier, Verdict};
use super::spec::{ConvergenceSpec, saturating_add};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Successful end of a session
#[derive(Debug, Clone)]
pub struct Converged<T> {
    /// Object from the last poll; `None` when absence was the target
    pub object: Option<T>,
    /// State reported by the last poll
    pub state: ObservedState,
    /// Number of polls performed
    pub polls: u32,
    /// Time from session start to the deciding poll
    pub elapsed: Duration,
}

/// Drives convergence sessions against a clock
#[derive(Debug, Clone, Default)]
pub struct ConvergenceEngine<C = TokioClock> {
    clock: C,
}

impl ConvergenceEngine<TokioClock> {
    pub fn new() -> Self {
        Self { clock: TokioClock }
    }
}

impl<C: Clock> ConvergenceEngine<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Wait until `poller` reports a state in the spec's target set
    ///
    /// Cancellation and the deadline are checked before every poll and
    /// interrupt both in-flight polls and the waits between them.
    pub async fn await_convergence<P>(
        &self,
        spec: &ConvergenceSpec,
        poller: &P,
        cancel: &CancellationToken,
    ) -> Result<Converged<P::Object>, ConvergeError>
    where
        P: Poller + ?Sized,
        P::Object: Serialize,
    {
        spec.validate()?;
        let started = self.clock.now();
        let deadline = spec.resolve_deadline(started)?;

        tracing::debug!(
            resource = %spec.resource(),
            expected = %spec.expected(),
            timeout = ?deadline.saturating_duration_since(started),
            "Waiting for convergence"
        );

        let mut session = Session {
            spec,
            started,
            deadline,
            polls: 0,
            last: None,
        };
        let mut classifier = Classifier::new(spec);

        if !spec.initial_delay().is_zero() {
            self.pause(&session, saturating_add(started, spec.initial_delay()), cancel)
                .await?;
        }

        loop {
            if cancel.is_cancelled() {
                return Err(session.cancelled());
            }
            let now = self.clock.now();
            if now >= deadline {
                return Err(session.timed_out(now));
            }

            session.polls += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(session.cancelled()),
                _ = self.clock.sleep_until(deadline) => {
                    return Err(session.timed_out(self.clock.now()));
                }
                result = poller.poll() => result,
            };

            match classifier.observe(result) {
                Verdict::Converged(observation) => {
                    let elapsed = self.clock.now().saturating_duration_since(started);
                    let state = observation.state();
                    tracing::info!(
                        resource = %spec.resource(),
                        state = %state,
                        polls = session.polls,
                        ?elapsed,
                        "Converged"
                    );
                    return Ok(Converged {
                        object: observation.into_object(),
                        state,
                        polls: session.polls,
                        elapsed,
                    });
                }
                Verdict::Pending(observation) => {
                    if let Some(observation) = observation {
                        tracing::debug!(
                            resource = %spec.resource(),
                            attempt = session.polls,
                            state = %observation.state(),
                            elapsed = ?self.clock.now().saturating_duration_since(started),
                            "Still pending"
                        );
                        session.last = Some(observation);
                    }
                }
                Verdict::Unexpected(observation) => {
                    let err = session.unexpected(observation);
                    tracing::warn!(resource = %spec.resource(), "{}", err);
                    return Err(err);
                }
                Verdict::Failed(source) => {
                    tracing::warn!(resource = %spec.resource(), "Poll failed: {}", source);
                    return Err(ConvergeError::Poll {
                        resource: spec.resource().to_string(),
                        polls: session.polls,
                        source,
                    });
                }
            }

            let wake = saturating_add(self.clock.now(), spec.wait_after(session.polls - 1));
            self.pause(&session, wake, cancel).await?;
        }
    }

    /// Sleep until `wake` (never past the deadline) unless cancelled first
    async fn pause<T: Serialize>(
        &self,
        session: &Session<'_, T>,
        wake: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), ConvergeError> {
        let wake = wake.min(session.deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(session.cancelled()),
            _ = self.clock.sleep_until(wake) => Ok(()),
        }
    }
}

/// Wait for `poller` using tokio's clock
pub async fn await_convergence<P>(
    spec: &ConvergenceSpec,
    poller: &P,
    cancel: &CancellationToken,
) -> Result<Converged<P::Object>, ConvergeError>
where
    P: Poller + ?Sized,
    P::Object: Serialize,
{
    ConvergenceEngine::new()
        .await_convergence(spec, poller, cancel)
        .await
}

/// Runtime state of one wait
struct Session<'a, T> {
    spec: &'a ConvergenceSpec,
    started: Instant,
    deadline: Instant,
    polls: u32,
    last: Option<Observation<T>>,
}

impl<T: Serialize> Session<'_, T> {
    fn last_state(&self) -> Option<ObservedState> {
        self.last.as_ref().map(Observation::state)
    }

    fn last_object(&self) -> Option<serde_json::Value> {
        snapshot(self.last.as_ref())
    }

    fn timed_out(&self, now: Instant) -> ConvergeError {
        let err = ConvergeError::Timeout {
            resource: self.spec.resource().to_string(),
            elapsed: now.saturating_duration_since(self.started),
            polls: self.polls,
            last_state: self.last_state(),
            last_object: self.last_object(),
        };
        tracing::warn!(resource = %self.spec.resource(), "{}", err);
        err
    }

    fn cancelled(&self) -> ConvergeError {
        tracing::info!(
            resource = %self.spec.resource(),
            polls = self.polls,
            "Convergence wait cancelled"
        );
        ConvergeError::Cancelled {
            resource: self.spec.resource().to_string(),
            polls: self.polls,
            last_state: self.last_state(),
        }
    }

    fn unexpected(&self, observation: Observation<T>) -> ConvergeError {
        ConvergeError::UnexpectedState {
            resource: self.spec.resource().to_string(),
            observed: observation.state(),
            expected: self.spec.expected(),
            polls: self.polls,
            last_object: snapshot(Some(&observation)),
        }
    }
}

fn snapshot<T: Serialize>(observation: Option<&Observation<T>>) -> Option<serde_json::Value> {
    observation
        .and_then(Observation::object)
        .and_then(|object| serde_json::to_value(object).ok())
}
