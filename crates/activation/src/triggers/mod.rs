//! Trigger strategies. Each one registers whatever it needs with the host
//! and hands back a [`TriggerGuard`]; releasing the guard is the only cleanup.

mod ceiling;
mod idle;
mod interaction;
mod manual;
mod proximity;

use std::fmt;
use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::controller::FireHandle;

pub use ceiling::CeilingTrigger;
pub use idle::{IdleSource, IdleTrigger};
pub use interaction::InteractionTrigger;
pub use manual::ManualTrigger;
pub use proximity::ProximityTrigger;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TriggerSource {
    Idle,
    Interaction,
    Proximity,
    Manual,
    Ceiling,
}

impl TriggerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Idle => "idle",
            TriggerSource::Interaction => "interaction",
            TriggerSource::Proximity => "proximity",
            TriggerSource::Manual => "manual",
            TriggerSource::Ceiling => "ceiling",
        }
    }
}

pub trait ActivationTrigger: Send + fmt::Debug {
    fn source(&self) -> TriggerSource;

    /// Registers the trigger. Must be called inside a tokio runtime.
    fn start(self: Box<Self>, fire: FireHandle) -> TriggerGuard;
}

/// Owns everything one trigger registered. Released exactly once, on
/// [`TriggerGuard::disconnect`] or drop.
pub struct TriggerGuard {
    source: TriggerSource,
    token: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    cleanup: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TriggerGuard {
    /// A guard with nothing to release, for triggers that never listen.
    pub fn inert(source: TriggerSource) -> Self {
        Self {
            source,
            token: None,
            task: None,
            cleanup: None,
        }
    }

    /// Spawns `work` so that cancelling the guard stops it at its next await.
    pub fn spawn<F>(source: TriggerSource, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = work => {}
            }
        });
        Self {
            source,
            token: Some(token),
            task: Some(task),
            cleanup: None,
        }
    }

    pub fn with_cleanup(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    pub fn source(&self) -> TriggerSource {
        self.source
    }

    pub fn is_inert(&self) -> bool {
        self.token.is_none() && self.task.is_none() && self.cleanup.is_none()
    }

    pub fn disconnect(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl Drop for TriggerGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for TriggerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerGuard")
            .field("source", &self.source)
            .field("inert", &self.is_inert())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn dropping_guard_cancels_work_and_runs_cleanup() {
        let finished = Arc::new(AtomicBool::new(false));
        let cleaned = Arc::new(AtomicUsize::new(0));
        let guard = {
            let finished = Arc::clone(&finished);
            let cleaned = Arc::clone(&cleaned);
            TriggerGuard::spawn(TriggerSource::Ceiling, async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                finished.store(true, Ordering::SeqCst);
            })
            .with_cleanup(move || {
                cleaned.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(!guard.is_inert());
        drop(guard);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inert_guard_owns_nothing() {
        let guard = TriggerGuard::inert(TriggerSource::Manual);
        assert!(guard.is_inert());
        assert_eq!(guard.source().as_str(), "manual");
        guard.disconnect();
    }
}
