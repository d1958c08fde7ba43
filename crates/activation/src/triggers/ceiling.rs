use std::time::Duration;

use super::{ActivationTrigger, TriggerGuard, TriggerSource};
use crate::controller::FireHandle;
use crate::model::ActivationCause;

/// Fires unconditionally once `after` has elapsed.
#[derive(Clone, Copy, Debug)]
pub struct CeilingTrigger {
    after: Duration,
}

impl CeilingTrigger {
    pub fn new(after: Duration) -> Self {
        Self { after }
    }
}

impl ActivationTrigger for CeilingTrigger {
    fn source(&self) -> TriggerSource {
        TriggerSource::Ceiling
    }

    fn start(self: Box<Self>, fire: FireHandle) -> TriggerGuard {
        let after = self.after;
        TriggerGuard::spawn(TriggerSource::Ceiling, async move {
            tokio::time::sleep(after).await;
            fire.fire(ActivationCause::Ceiling);
        })
    }
}
