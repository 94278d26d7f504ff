//! State classification policy
//!
//! Turns one poll result into a verdict. The classifier is stateful only in
//! the streak counters that `continuous_target_occurrences` and
//! `AbsencePolicy::Tolerate` need; everything else comes from the spec.

use super::error::PollError;
use super::poll::{Observation, PollResult};
use super::spec::{AbsencePolicy, ConvergenceSpec, MissingLabelPolicy};

/// Decision for a single poll
#[derive(Debug)]
pub enum Verdict<T> {
    /// The session is done
    Converged(Observation<T>),
    /// Keep waiting; `None` when the poll failed with a tolerated error
    Pending(Option<Observation<T>>),
    /// The observation fits neither the pending nor the target set
    Unexpected(Observation<T>),
    /// The read failed in a way this session does not tolerate
    Failed(PollError),
}

enum Class {
    Target,
    Pending,
    Unlabelled,
    Unknown,
}

/// Per-session classifier
#[derive(Debug)]
pub struct Classifier<'a> {
    spec: &'a ConvergenceSpec,
    target_streak: u32,
    absent_streak: u32,
}

impl<'a> Classifier<'a> {
    pub fn new(spec: &'a ConvergenceSpec) -> Self {
        Self {
            spec,
            target_streak: 0,
            absent_streak: 0,
        }
    }

    pub fn observe<T>(&mut self, result: PollResult<T>) -> Verdict<T> {
        match result {
            Ok(Observation::Absent) => self.absent(|| Verdict::Unexpected(Observation::Absent)),
            Ok(observation) => {
                self.absent_streak = 0;
                self.present(observation)
            }
            Err(err) if err.is_not_found() => self.absent(|| Verdict::Failed(err)),
            Err(err) if self.spec.tolerates(err.kind()) => {
                tracing::warn!(
                    resource = %self.spec.resource(),
                    kind = %err.kind(),
                    "Tolerated poll error: {}",
                    err
                );
                self.target_streak = 0;
                Verdict::Pending(None)
            }
            Err(err) => Verdict::Failed(err),
        }
    }

    fn present<T>(&mut self, observation: Observation<T>) -> Verdict<T> {
        let spec = self.spec;
        let class = match &observation {
            Observation::Present { state, .. } if spec.is_target(state) => Class::Target,
            Observation::Present { state, .. } if spec.is_pending(state) => Class::Pending,
            Observation::Present { .. } | Observation::Absent => Class::Unknown,
            Observation::Unlabelled { .. } => Class::Unlabelled,
        };

        match class {
            Class::Target => self.hit_target(observation),
            Class::Pending => {
                self.target_streak = 0;
                Verdict::Pending(Some(observation))
            }
            Class::Unlabelled => {
                self.target_streak = 0;
                match spec.missing_label() {
                    MissingLabelPolicy::Pending => Verdict::Pending(Some(observation)),
                    MissingLabelPolicy::Fail => Verdict::Unexpected(observation),
                }
            }
            Class::Unknown => Verdict::Unexpected(observation),
        }
    }

    /// `on_fail` builds the verdict used when absence is not acceptable; it is
    /// an unexpected state for an `Absent` observation and the original error
    /// for a not-found poll error.
    fn absent<T>(&mut self, on_fail: impl FnOnce() -> Verdict<T>) -> Verdict<T> {
        match self.spec.absence() {
            AbsencePolicy::Succeed => {
                self.absent_streak += 1;
                self.hit_target(Observation::Absent)
            }
            AbsencePolicy::Tolerate { max_consecutive } => {
                self.target_streak = 0;
                self.absent_streak += 1;
                if self.absent_streak > max_consecutive {
                    on_fail()
                } else {
                    Verdict::Pending(Some(Observation::Absent))
                }
            }
            AbsencePolicy::Fail => on_fail(),
        }
    }

    fn hit_target<T>(&mut self, observation: Observation<T>) -> Verdict<T> {
        self.target_streak += 1;
        if self.target_streak >= self.spec.continuous_target_occurrences() {
            Verdict::Converged(observation)
        } else {
            Verdict::Pending(Some(observation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::error::PollErrorKind;
    use crate::convergence::spec::ConvergenceSpecBuilder;
    use std::time::Duration;

    fn spec() -> ConvergenceSpecBuilder {
        ConvergenceSpec::builder("cosmosdb account acct1")
            .pending(["Creating", "Updating"])
            .target(["Succeeded"])
            .min_poll_interval(Duration::from_secs(1))
            .timeout(Duration::from_secs(60))
    }

    fn label(state: &str) -> PollResult<&'static str> {
        Ok(Observation::present("obj", state))
    }

    #[test]
    fn test_target_pending_unexpected() {
        let spec = spec().build().unwrap();
        let mut classifier = Classifier::new(&spec);

        assert!(matches!(
            classifier.observe(label("Creating")),
            Verdict::Pending(Some(_))
        ));
        assert!(matches!(
            classifier.observe(label("Succeeded")),
            Verdict::Converged(_)
        ));
        assert!(matches!(
            classifier.observe(label("Failed")),
            Verdict::Unexpected(_)
        ));
    }

    #[test]
    fn test_continuous_occurrences_reset_on_pending() {
        let spec = spec().continuous_target_occurrences(2).build().unwrap();
        let mut classifier = Classifier::new(&spec);

        assert!(matches!(
            classifier.observe(label("Succeeded")),
            Verdict::Pending(_)
        ));
        assert!(matches!(
            classifier.observe(label("Updating")),
            Verdict::Pending(_)
        ));
        assert!(matches!(
            classifier.observe(label("Succeeded")),
            Verdict::Pending(_)
        ));
        assert!(matches!(
            classifier.observe(label("Succeeded")),
            Verdict::Converged(_)
        ));
    }

    #[test]
    fn test_absence_asymmetry() {
        let create = spec().build().unwrap();
        let mut classifier = Classifier::new(&create);
        assert!(matches!(
            classifier.observe::<&str>(Ok(Observation::Absent)),
            Verdict::Unexpected(Observation::Absent)
        ));
        assert!(matches!(
            classifier.observe::<&str>(Err(PollError::not_found("gone"))),
            Verdict::Failed(_)
        ));

        let delete = spec().treat_absence_as_target().build().unwrap();
        let mut classifier = Classifier::new(&delete);
        assert!(matches!(
            classifier.observe::<&str>(Err(PollError::not_found("gone"))),
            Verdict::Converged(Observation::Absent)
        ));
    }

    #[test]
    fn test_tolerated_absence_runs_out() {
        let spec = spec()
            .absence(AbsencePolicy::Tolerate { max_consecutive: 2 })
            .build()
            .unwrap();
        let mut classifier = Classifier::new(&spec);

        assert!(matches!(
            classifier.observe::<&str>(Ok(Observation::Absent)),
            Verdict::Pending(_)
        ));
        assert!(matches!(
            classifier.observe::<&str>(Err(PollError::not_found("404"))),
            Verdict::Pending(_)
        ));
        assert!(matches!(
            classifier.observe::<&str>(Ok(Observation::Absent)),
            Verdict::Unexpected(_)
        ));
    }

    #[test]
    fn test_tolerated_absence_streak_resets() {
        let spec = spec()
            .absence(AbsencePolicy::Tolerate { max_consecutive: 1 })
            .build()
            .unwrap();
        let mut classifier = Classifier::new(&spec);

        assert!(matches!(
            classifier.observe::<&str>(Ok(Observation::Absent)),
            Verdict::Pending(_)
        ));
        assert!(matches!(
            classifier.observe(label("Creating")),
            Verdict::Pending(_)
        ));
        assert!(matches!(
            classifier.observe::<&str>(Ok(Observation::Absent)),
            Verdict::Pending(_)
        ));
    }

    #[test]
    fn test_missing_label_policy() {
        let strict = spec().build().unwrap();
        let mut classifier = Classifier::new(&strict);
        assert!(matches!(
            classifier.observe(Ok(Observation::unlabelled("obj"))),
            Verdict::Unexpected(Observation::Unlabelled { .. })
        ));

        let lenient = spec()
            .missing_label(MissingLabelPolicy::Pending)
            .build()
            .unwrap();
        let mut classifier = Classifier::new(&lenient);
        assert!(matches!(
            classifier.observe(Ok(Observation::unlabelled("obj"))),
            Verdict::Pending(Some(_))
        ));
    }

    #[test]
    fn test_tolerated_errors() {
        let spec = spec().tolerate(PollErrorKind::Throttled).build().unwrap();
        let mut classifier = Classifier::new(&spec);

        assert!(matches!(
            classifier.observe::<&str>(Err(PollError::throttled("429"))),
            Verdict::Pending(None)
        ));
        assert!(matches!(
            classifier.observe::<&str>(Err(PollError::api("500"))),
            Verdict::Failed(_)
        ));
    }
}
