use super::{ActivationTrigger, TriggerGuard, TriggerSource};
use crate::controller::FireHandle;

/// Waits for an explicit `fire(Manual)` from the expand control. Never
/// fires on its own and carries no ceiling.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualTrigger;

impl ActivationTrigger for ManualTrigger {
    fn source(&self) -> TriggerSource {
        TriggerSource::Manual
    }

    fn start(self: Box<Self>, _fire: FireHandle) -> TriggerGuard {
        TriggerGuard::inert(TriggerSource::Manual)
    }
}
