//! Host environment primitives consumed by the trigger strategies.
//!
//! Every primitive is optional. [`HostCapabilities`] is inspected once when a
//! plan is resolved; a missing primitive selects a simpler strategy up front
//! rather than being re-checked while waiting.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagedefer_core_types::ElementId;
use pagedefer_event_bus::InteractionBus;
use tokio::sync::watch;

use crate::error::ObserveError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IdleDeadline {
    pub did_timeout: bool,
}

/// Host idle-scheduling primitive.
#[async_trait]
pub trait IdleScheduler: Send + Sync + fmt::Debug {
    /// Resolves inside the host's next idle window, or once `timeout` elapsed.
    async fn idle(&self, timeout: Duration) -> IdleDeadline;
}

/// Treats the executor as idle once it has run every other ready task for
/// `rounds` consecutive yields.
#[derive(Clone, Copy, Debug)]
pub struct YieldIdleScheduler {
    rounds: usize,
}

impl YieldIdleScheduler {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds: rounds.max(1),
        }
    }
}

impl Default for YieldIdleScheduler {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl IdleScheduler for YieldIdleScheduler {
    async fn idle(&self, timeout: Duration) -> IdleDeadline {
        let drained = tokio::time::timeout(timeout, async {
            for _ in 0..self.rounds {
                tokio::task::yield_now().await;
            }
        })
        .await;
        IdleDeadline {
            did_timeout: drained.is_err(),
        }
    }
}

/// Idle window opened and closed by the embedding host (for instance after
/// its first paint settles).
#[derive(Debug)]
pub struct IdleWindow {
    open: watch::Sender<bool>,
}

impl IdleWindow {
    pub fn new() -> Arc<Self> {
        let (open, _) = watch::channel(false);
        Arc::new(Self { open })
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    pub fn close(&self) {
        self.open.send_replace(false);
    }

    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }
}

#[async_trait]
impl IdleScheduler for IdleWindow {
    async fn idle(&self, timeout: Duration) -> IdleDeadline {
        let mut rx = self.open.subscribe();
        let opened = tokio::time::timeout(timeout, rx.wait_for(|open| *open)).await;
        IdleDeadline {
            did_timeout: !matches!(opened, Ok(Ok(_))),
        }
    }
}

pub type IntersectCallback = Box<dyn FnOnce() + Send + 'static>;

/// Host viewport-intersection primitive. One observation per section.
pub trait IntersectionHost: Send + Sync + fmt::Debug {
    /// Calls `on_enter` once when `element` comes within `root_margin_px` of
    /// the viewport, then forgets the observation.
    fn observe(
        &self,
        element: &ElementId,
        root_margin_px: u32,
        on_enter: IntersectCallback,
    ) -> Result<Observation, ObserveError>;

    fn active_observations(&self) -> usize;
}

/// Live observation. Dropping it disconnects the observer.
pub struct Observation {
    disconnect: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Observation {
    pub fn new(disconnect: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    pub fn disconnect(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}

/// What the host offers. Detected once per plan.
#[derive(Clone, Debug, Default)]
pub struct HostCapabilities {
    pub idle: Option<Arc<dyn IdleScheduler>>,
    pub viewport: Option<Arc<dyn IntersectionHost>>,
    pub interactions: Option<Arc<InteractionBus>>,
}

impl HostCapabilities {
    /// No primitives at all, as on a bare server render.
    pub fn headless() -> Self {
        Self::default()
    }

    pub fn with_idle(mut self, idle: Arc<dyn IdleScheduler>) -> Self {
        self.idle = Some(idle);
        self
    }

    pub fn with_viewport(mut self, viewport: Arc<dyn IntersectionHost>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_interactions(mut self, bus: Arc<InteractionBus>) -> Self {
        self.interactions = Some(bus);
        self
    }
}
