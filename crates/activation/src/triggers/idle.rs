use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{ActivationTrigger, TriggerGuard, TriggerSource};
use crate::controller::FireHandle;
use crate::host::IdleScheduler;
use crate::model::ActivationCause;

/// Where the idle signal comes from, fixed when the plan is resolved.
#[derive(Clone)]
pub enum IdleSource {
    Host(Arc<dyn IdleScheduler>),
    /// Host has no idle primitive; wait a short fixed delay instead.
    FixedDelay(Duration),
}

impl fmt::Debug for IdleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleSource::Host(scheduler) => f.debug_tuple("Host").field(scheduler).finish(),
            IdleSource::FixedDelay(delay) => f.debug_tuple("FixedDelay").field(delay).finish(),
        }
    }
}

#[derive(Debug)]
pub struct IdleTrigger {
    source: IdleSource,
    timeout: Duration,
    min_delay: Duration,
}

impl IdleTrigger {
    pub fn new(source: IdleSource, timeout: Duration, min_delay: Duration) -> Self {
        Self {
            source,
            timeout,
            min_delay,
        }
    }
}

impl ActivationTrigger for IdleTrigger {
    fn source(&self) -> TriggerSource {
        TriggerSource::Idle
    }

    fn start(self: Box<Self>, fire: FireHandle) -> TriggerGuard {
        let IdleTrigger {
            source,
            timeout,
            min_delay,
        } = *self;
        TriggerGuard::spawn(TriggerSource::Idle, async move {
            let cause = match source {
                IdleSource::Host(scheduler) => {
                    // Hosts are trusted to honour the timeout, but not relied on.
                    match tokio::time::timeout(timeout, scheduler.idle(timeout)).await {
                        Ok(deadline) if !deadline.did_timeout => ActivationCause::Idle,
                        _ => ActivationCause::IdleTimeout,
                    }
                }
                IdleSource::FixedDelay(delay) => {
                    tokio::time::sleep(delay).await;
                    ActivationCause::Idle
                }
            };
            tokio::time::sleep(min_delay).await;
            fire.fire(cause);
        })
    }
}
