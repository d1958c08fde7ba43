use std::sync::Arc;
use std::time::Duration;

use pagedefer_core_types::ElementId;
use tokio::sync::oneshot;
use tracing::debug;

use super::{ActivationTrigger, TriggerGuard, TriggerSource};
use crate::controller::FireHandle;
use crate::error::ObserveError;
use crate::host::IntersectionHost;
use crate::model::ActivationCause;

#[derive(Debug)]
pub struct ProximityTrigger {
    host: Arc<dyn IntersectionHost>,
    element: ElementId,
    root_margin_px: u32,
    min_delay: Duration,
}

impl ProximityTrigger {
    pub fn new(
        host: Arc<dyn IntersectionHost>,
        element: ElementId,
        root_margin_px: u32,
        min_delay: Duration,
    ) -> Self {
        Self {
            host,
            element,
            root_margin_px,
            min_delay,
        }
    }
}

impl ActivationTrigger for ProximityTrigger {
    fn source(&self) -> TriggerSource {
        TriggerSource::Proximity
    }

    fn start(self: Box<Self>, fire: FireHandle) -> TriggerGuard {
        let (entered_tx, entered_rx) = oneshot::channel::<()>();
        let observed = self.host.observe(
            &self.element,
            self.root_margin_px,
            Box::new(move || {
                let _ = entered_tx.send(());
            }),
        );
        let observation = match observed {
            Ok(observation) => observation,
            Err(ObserveError::NotMounted(element)) => {
                debug!(%element, "region root not mounted; activating now");
                fire.fire(ActivationCause::Unobservable);
                return TriggerGuard::inert(TriggerSource::Proximity);
            }
        };
        let min_delay = self.min_delay;
        TriggerGuard::spawn(TriggerSource::Proximity, async move {
            match entered_rx.await {
                Ok(()) => {
                    tokio::time::sleep(min_delay).await;
                    fire.fire(ActivationCause::Proximity);
                }
                // Host dropped the observer without reporting.
                Err(_) => {
                    fire.fire(ActivationCause::Unobservable);
                }
            }
        })
        .with_cleanup(move || observation.disconnect())
    }
}
