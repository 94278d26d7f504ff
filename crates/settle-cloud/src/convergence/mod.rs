//! Asynchronous operation convergence
//!
//! The management API accepts a mutation before the change is applied, and
//! some deletes report completion while the object is still draining. After
//! every mutation the caller waits here until the remote object settles.
//!
//! ```text
//! caller ──► ConvergenceEngine ──► Poller ──► remote API
//!   ▲              │  classify (policy)
//!   └── Converged / ConvergeError
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod policy;
pub mod poll;
pub mod spec;

pub use clock::{Clock, TokioClock};
pub use engine::{Converged, ConvergenceEngine, await_convergence};
pub use error::{ConvergeError, PollError, PollErrorKind};
pub use policy::{Classifier, Verdict};
pub use poll::{Observation, ObservedState, PollFn, PollResult, Poller, StateLabel, poll_fn};
pub use spec::{
    AbsencePolicy, ConvergenceSpec, ConvergenceSpecBuilder, Deadline, MissingLabelPolicy,
    PollBackoff,
};
