//! Convergence Specification
//!
//! An immutable description of one wait: which state labels mean "still in
//! progress", which mean "done", how often to look, and when to give up.

use super::error::{ConvergeError, PollErrorKind};
use super::poll::StateLabel;
use crate::operation::OperationKind;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Furthest an instant is ever pushed ahead (30 years)
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `from + delay`, capped at `FAR_FUTURE` ahead of `from`
pub(crate) fn saturating_add(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay.min(FAR_FUTURE)).unwrap_or(from)
}

/// When the session gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Relative to the moment the session starts
    After(Duration),
    /// Absolute, typically inherited from the enclosing operation
    At(Instant),
}

/// How a session treats "the remote object does not exist"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsencePolicy {
    /// Absence is an unexpected state (create/update/read sessions)
    Fail,
    /// Absence is the target (delete sessions)
    Succeed,
    /// Absence counts as pending for up to `max_consecutive` polls in a row,
    /// covering reads that lag behind a freshly accepted create
    Tolerate { max_consecutive: u32 },
}

/// How a session treats an object that exists but reports no state label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingLabelPolicy {
    /// Fail as an unexpected state
    #[default]
    Fail,
    /// Keep waiting, as if the label were pending
    Pending,
}

/// Spacing between polls
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PollBackoff {
    /// Every wait is the minimum poll interval
    #[default]
    Fixed,
    /// Waits grow by `multiplier` per attempt, capped at `max_interval`
    Exponential { multiplier: f64, max_interval: Duration },
}

impl PollBackoff {
    /// Wait after the poll numbered `attempt` (0-based); never shorter than `min`
    pub fn delay_for_attempt(&self, min: Duration, attempt: u32) -> Duration {
        match *self {
            PollBackoff::Fixed => min,
            PollBackoff::Exponential {
                multiplier,
                max_interval,
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let delay = min.as_secs_f64() * factor;
                let capped = delay.min(max_interval.as_secs_f64());
                Duration::try_from_secs_f64(capped)
                    .unwrap_or(max_interval)
                    .max(min)
            }
        }
    }
}

/// Validated, immutable configuration of one convergence session
#[derive(Debug, Clone)]
pub struct ConvergenceSpec {
    resource: String,
    pending: BTreeSet<StateLabel>,
    target: BTreeSet<StateLabel>,
    min_poll_interval: Duration,
    deadline: Option<Deadline>,
    initial_delay: Duration,
    continuous_target_occurrences: u32,
    backoff: PollBackoff,
    absence: AbsencePolicy,
    missing_label: MissingLabelPolicy,
    tolerated_errors: HashSet<PollErrorKind>,
}

impl ConvergenceSpec {
    /// Start a specification for `resource` (used in logs and errors)
    pub fn builder(resource: impl Into<String>) -> ConvergenceSpecBuilder {
        ConvergenceSpecBuilder::new(resource.into())
    }

    /// Start a specification whose absence policy matches the operation:
    /// delete sessions succeed on absence, every other session fails on it.
    pub fn for_operation(kind: OperationKind, resource: impl Into<String>) -> ConvergenceSpecBuilder {
        let absence = match kind {
            OperationKind::Delete => AbsencePolicy::Succeed,
            OperationKind::Create | OperationKind::Read | OperationKind::Update => {
                AbsencePolicy::Fail
            }
        };
        Self::builder(resource).absence(absence)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn pending(&self) -> &BTreeSet<StateLabel> {
        &self.pending
    }

    pub fn target(&self) -> &BTreeSet<StateLabel> {
        &self.target
    }

    pub fn is_pending(&self, label: &str) -> bool {
        self.pending.contains(label)
    }

    pub fn is_target(&self, label: &str) -> bool {
        self.target.contains(label)
    }

    pub fn min_poll_interval(&self) -> Duration {
        self.min_poll_interval
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn continuous_target_occurrences(&self) -> u32 {
        self.continuous_target_occurrences
    }

    pub fn backoff(&self) -> PollBackoff {
        self.backoff
    }

    pub fn absence(&self) -> AbsencePolicy {
        self.absence
    }

    pub fn missing_label(&self) -> MissingLabelPolicy {
        self.missing_label
    }

    pub fn tolerates(&self, kind: PollErrorKind) -> bool {
        self.tolerated_errors.contains(&kind)
    }

    /// Wait to apply after the poll numbered `attempt` (0-based)
    pub fn wait_after(&self, attempt: u32) -> Duration {
        self.backoff.delay_for_attempt(self.min_poll_interval, attempt)
    }

    /// Human-readable summary of the accepted labels
    pub fn expected(&self) -> String {
        let join = |set: &BTreeSet<StateLabel>| {
            set.iter()
                .map(|l| format!("{:?}", l))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut expected = format!("target [{}]", join(&self.target));
        if !self.pending.is_empty() {
            expected.push_str(&format!(", pending [{}]", join(&self.pending)));
        }
        if self.absence == AbsencePolicy::Succeed {
            expected.push_str(", or absence");
        }
        expected
    }

    /// Turn the configured deadline into an absolute instant
    ///
    /// An unbounded wait is never allowed: a missing deadline is a
    /// configuration error, not "wait forever". Relative timeouts too large
    /// to represent are capped decades ahead.
    pub fn resolve_deadline(&self, started: Instant) -> Result<Instant, ConvergeError> {
        match self.deadline {
            Some(Deadline::After(timeout)) => Ok(saturating_add(started, timeout)),
            Some(Deadline::At(at)) => Ok(at),
            None => Err(ConvergeError::Configuration(format!(
                "no deadline configured for {}",
                self.resource
            ))),
        }
    }

    /// Check the structural invariants of the label sets and timings
    pub fn validate(&self) -> Result<(), ConvergeError> {
        let invalid = |msg: String| Err(ConvergeError::Configuration(msg));

        if self.target.is_empty() {
            return invalid(format!("no target states configured for {}", self.resource));
        }
        if let Some(label) = self.pending.intersection(&self.target).next() {
            return invalid(format!(
                "state {:?} is both pending and target for {}",
                label, self.resource
            ));
        }
        if self.min_poll_interval.is_zero() {
            return invalid(format!(
                "minimum poll interval must be positive for {}",
                self.resource
            ));
        }
        if self.continuous_target_occurrences == 0 {
            return invalid(format!(
                "continuous target occurrences must be at least 1 for {}",
                self.resource
            ));
        }
        if self.deadline == Some(Deadline::After(Duration::ZERO)) {
            return invalid(format!("timeout must be positive for {}", self.resource));
        }
        if let AbsencePolicy::Tolerate { max_consecutive: 0 } = self.absence {
            return invalid(format!(
                "tolerated absences must be at least 1 for {} (use AbsencePolicy::Fail)",
                self.resource
            ));
        }
        if let PollBackoff::Exponential {
            multiplier,
            max_interval,
        } = self.backoff
        {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return invalid(format!(
                    "backoff multiplier must be a finite value >= 1.0 for {}",
                    self.resource
                ));
            }
            if max_interval < self.min_poll_interval {
                return invalid(format!(
                    "backoff max interval is below the minimum poll interval for {}",
                    self.resource
                ));
            }
        }
        if self.tolerated_errors.contains(&PollErrorKind::NotFound) {
            return invalid(format!(
                "not-found errors are governed by the absence policy for {}",
                self.resource
            ));
        }
        Ok(())
    }
}

/// Builder for `ConvergenceSpec`
#[derive(Debug, Clone)]
pub struct ConvergenceSpecBuilder {
    spec: ConvergenceSpec,
}

impl ConvergenceSpecBuilder {
    fn new(resource: String) -> Self {
        Self {
            spec: ConvergenceSpec {
                resource,
                pending: BTreeSet::new(),
                target: BTreeSet::new(),
                min_poll_interval: Duration::from_secs(10),
                deadline: None,
                initial_delay: Duration::ZERO,
                continuous_target_occurrences: 1,
                backoff: PollBackoff::Fixed,
                absence: AbsencePolicy::Fail,
                missing_label: MissingLabelPolicy::Fail,
                tolerated_errors: HashSet::new(),
            },
        }
    }

    pub fn pending<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateLabel>,
    {
        self.spec.pending.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn target<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateLabel>,
    {
        self.spec.target.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.spec.min_poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.deadline = Some(Deadline::After(timeout));
        self
    }

    pub fn deadline_at(mut self, at: Instant) -> Self {
        self.spec.deadline = Some(Deadline::At(at));
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.spec.initial_delay = delay;
        self
    }

    pub fn continuous_target_occurrences(mut self, count: u32) -> Self {
        self.spec.continuous_target_occurrences = count;
        self
    }

    pub fn backoff(mut self, backoff: PollBackoff) -> Self {
        self.spec.backoff = backoff;
        self
    }

    pub fn absence(mut self, policy: AbsencePolicy) -> Self {
        self.spec.absence = policy;
        self
    }

    /// Delete sessions: "gone" is the state we are waiting for
    pub fn treat_absence_as_target(self) -> Self {
        self.absence(AbsencePolicy::Succeed)
    }

    pub fn missing_label(mut self, policy: MissingLabelPolicy) -> Self {
        self.spec.missing_label = policy;
        self
    }

    /// Treat poll errors of `kind` as "still pending" instead of fatal
    pub fn tolerate(mut self, kind: PollErrorKind) -> Self {
        self.spec.tolerated_errors.insert(kind);
        self
    }

    pub fn build(self) -> Result<ConvergenceSpec, ConvergeError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}
