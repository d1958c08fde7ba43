use std::sync::Arc;
use std::time::Duration;

use pagedefer_event_bus::{EventBus, InteractionBus};
use tokio::sync::broadcast::error::RecvError;
use tracing::trace;

use super::{ActivationTrigger, TriggerGuard, TriggerSource};
use crate::controller::FireHandle;
use crate::model::ActivationCause;

/// First document interaction, then `min_delay`. Bounded by `ceiling`, which
/// also wins if it expires during the settle delay.
#[derive(Debug)]
pub struct InteractionTrigger {
    bus: Arc<InteractionBus>,
    ceiling: Duration,
    min_delay: Duration,
}

impl InteractionTrigger {
    pub fn new(bus: Arc<InteractionBus>, ceiling: Duration, min_delay: Duration) -> Self {
        Self {
            bus,
            ceiling,
            min_delay,
        }
    }
}

impl ActivationTrigger for InteractionTrigger {
    fn source(&self) -> TriggerSource {
        TriggerSource::Interaction
    }

    fn start(self: Box<Self>, fire: FireHandle) -> TriggerGuard {
        // Subscribe before spawning so events published right after arming count.
        let mut events = self.bus.subscribe();
        let ceiling = tokio::time::sleep(self.ceiling);
        let min_delay = self.min_delay;
        TriggerGuard::spawn(TriggerSource::Interaction, async move {
            tokio::pin!(ceiling);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut ceiling => {
                        fire.fire(ActivationCause::InteractionCeiling);
                        return;
                    }
                    received = events.recv() => match received {
                        Ok(event) => {
                            trace!(kind = ?event.kind, "interaction observed");
                            break;
                        }
                        Err(RecvError::Lagged(_)) => break,
                        Err(RecvError::Closed) => {
                            fire.fire(ActivationCause::CapabilityMissing);
                            return;
                        }
                    },
                }
            }
            drop(events);
            tokio::select! {
                biased;
                _ = &mut ceiling => fire.fire(ActivationCause::InteractionCeiling),
                _ = tokio::time::sleep(min_delay) => fire.fire(ActivationCause::Interaction),
            };
        })
    }
}
