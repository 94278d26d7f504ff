//! Operation kinds and the per-call context handed to resource handlers

use crate::convergence::spec::saturating_add;
use crate::convergence::{ConvergenceSpec, ConvergenceSpecBuilder, PollBackoff};
use settle_config::{Phase, PollingDefaults, Settings};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle operation on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
}

impl OperationKind {
    pub fn phase(self) -> Phase {
        match self {
            OperationKind::Create => Phase::Create,
            OperationKind::Read => Phase::Read,
            OperationKind::Update => Phase::Update,
            OperationKind::Delete => Phase::Delete,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Read => write!(f, "read"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Capabilities and bounds for one resource operation
///
/// The deadline is fixed when the context is created, so the mutation and
/// the convergence wait that follows it share one budget.
#[derive(Debug, Clone)]
pub struct OperationContext {
    kind: OperationKind,
    deadline: Instant,
    cancel: CancellationToken,
    min_poll_interval: Duration,
    max_poll_interval: Duration,
}

impl OperationContext {
    pub fn new(kind: OperationKind, timeout: Duration) -> Self {
        let polling = PollingDefaults::default();
        Self {
            kind,
            deadline: saturating_add(Instant::now(), timeout),
            cancel: CancellationToken::new(),
            min_poll_interval: polling.min_interval(),
            max_poll_interval: polling.max_interval(),
        }
    }

    /// Use the configured timeout for `kind` and the configured poll spacing
    pub fn from_settings(kind: OperationKind, settings: &Settings) -> Self {
        Self::new(kind, settings.timeouts.for_phase(kind.phase())).with_polling(&settings.polling)
    }

    pub fn with_polling(mut self, polling: &PollingDefaults) -> Self {
        self.min_poll_interval = polling.min_interval();
        self.max_poll_interval = polling.max_interval();
        self
    }

    /// Share an outer cancellation signal (e.g. an interactive abort)
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn min_poll_interval(&self) -> Duration {
        self.min_poll_interval
    }

    /// Waits growing by `multiplier` from the minimum up to the configured
    /// maximum poll interval
    pub fn growing_backoff(&self, multiplier: f64) -> PollBackoff {
        PollBackoff::Exponential {
            multiplier,
            max_interval: self.max_poll_interval.max(self.min_poll_interval),
        }
    }

    /// Start a convergence spec bound to this operation's kind and deadline,
    /// polling at the configured minimum interval unless overridden
    pub fn convergence(&self, resource: impl Into<String>) -> ConvergenceSpecBuilder {
        ConvergenceSpec::for_operation(self.kind, resource)
            .deadline_at(self.deadline)
            .min_poll_interval(self.min_poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::AbsencePolicy;

    #[test]
    fn test_operation_display() {
        assert_eq!(OperationKind::Create.to_string(), "create");
        assert_eq!(OperationKind::Delete.to_string(), "delete");
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_from_settings() {
        let mut settings = Settings::default();
        settings.timeouts.delete_secs = 90;

        let ctx = OperationContext::from_settings(OperationKind::Delete, &settings);
        assert_eq!(ctx.remaining(), Duration::from_secs(90));

        let spec = ctx
            .convergence("redis cache cache1")
            .target(["Deleted"])
            .build()
            .unwrap();
        assert_eq!(spec.absence(), AbsencePolicy::Succeed);
        assert_eq!(
            spec.resolve_deadline(Instant::now()).unwrap(),
            ctx.deadline()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_carries_polling_defaults() {
        let mut settings = Settings::default();
        settings.polling.min_interval_secs = 3;
        settings.polling.max_interval_secs = 12;

        let ctx = OperationContext::from_settings(OperationKind::Update, &settings);
        let spec = ctx.convergence("x").target(["Succeeded"]).build().unwrap();
        assert_eq!(spec.min_poll_interval(), Duration::from_secs(3));

        let spec = ctx
            .convergence("x")
            .target(["Succeeded"])
            .backoff(ctx.growing_backoff(2.0))
            .build()
            .unwrap();
        assert_eq!(spec.wait_after(1), Duration::from_secs(6));
        assert_eq!(spec.wait_after(5), Duration::from_secs(12));

        let spec = ctx
            .convergence("x")
            .target(["Succeeded"])
            .min_poll_interval(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(spec.min_poll_interval(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_does_not_overflow() {
        let ctx = OperationContext::new(OperationKind::Create, Duration::MAX);
        assert!(ctx.deadline() > Instant::now());

        let mut settings = Settings::default();
        settings.timeouts.create_secs = u64::MAX;
        let ctx = OperationContext::from_settings(OperationKind::Create, &settings);
        assert!(ctx.remaining() > Duration::from_secs(365 * 24 * 60 * 60));
    }

    #[test]
    fn test_shared_cancel() {
        let outer = CancellationToken::new();
        let ctx = OperationContext::new(OperationKind::Create, Duration::from_secs(1))
            .with_cancel(outer.clone());
        outer.cancel();
        assert!(ctx.cancel().is_cancelled());
    }
}
