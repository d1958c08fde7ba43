//! Deferred activation for page sections.
//!
//! A section's [`ActivationController`] starts `Pending`, waits on the trigger
//! strategies chosen by its [`ActivationPlan`], and flips to `Activated` exactly
//! once. Every timer, subscription and observer a trigger registered is torn
//! down by whichever source fires first, or by unmount.

pub mod controller;
pub mod error;
pub mod events;
pub mod host;
pub mod metrics;
pub mod model;
pub mod plan;
pub mod triggers;
pub mod viewport;

pub use controller::{ActivationController, FireHandle};
pub use error::{ActivationError, ObserveError};
pub use host::{
    HostCapabilities, IdleDeadline, IdleScheduler, IdleWindow, IntersectCallback,
    IntersectionHost, Observation, YieldIdleScheduler,
};
pub use model::{ActivationCause, ActivationDefaults, ActivationPhase, TriggerConfig};
pub use plan::{ActivationPlan, PlanInput, PlannedTrigger};
pub use triggers::{ActivationTrigger, IdleSource, TriggerGuard, TriggerSource};
pub use viewport::{ElementBox, SimulatedViewport};

pub use pagedefer_core_types::{ElementId, Priority, SectionId, TriggerKind};
