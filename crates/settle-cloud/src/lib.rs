//! settle cloud core
//!
//! Provider-agnostic pieces of a declarative-infrastructure provider: the
//! resource handler abstraction and the convergence engine every mutating
//! operation uses to wait for an eventually consistent control plane.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          ResourceHandler (create/update/...)     │
//! │   mutate ──► OperationContext::convergence()     │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ConvergenceSpec + Poller
//! ┌─────────────────▼───────────────────────────────┐
//! │               ConvergenceEngine                  │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ Classifier   │  │ Clock/Cancel │             │
//! │  └──────────────┘  └──────────────┘             │
//! └─────────────────┬───────────────────────────────┘
//!                   │ poll()
//! ┌─────────────────▼───────────────────────────────┐
//! │      provider adapters (settle-cloud-azure)      │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod convergence;
pub mod error;
pub mod operation;
pub mod provider;
pub mod state;

// Re-exports
pub use convergence::{
    AbsencePolicy, ConvergeError, Converged, ConvergenceEngine, ConvergenceSpec,
    MissingLabelPolicy, Observation, ObservedState, PollBackoff, PollError, PollErrorKind,
    PollResult, Poller, await_convergence, poll_fn,
};
pub use error::{CloudError, Result};
pub use operation::{OperationContext, OperationKind};
pub use provider::{ResourceConfig, ResourceHandler};
pub use state::{ResourceState, ResourceStatus};
