use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use pagedefer_core_types::SectionId;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::ActivationError;
use crate::events;
use crate::model::{ActivationCause, ActivationPhase};
use crate::plan::ActivationPlan;
use crate::triggers::TriggerGuard;

struct ControllerState {
    phase: ActivationPhase,
    armed: bool,
    unmounted: bool,
    guards: Vec<TriggerGuard>,
    armed_at: Option<Instant>,
    activated_at: Option<Instant>,
}

struct ControllerInner {
    section: SectionId,
    state: Mutex<ControllerState>,
    phase_tx: watch::Sender<ActivationPhase>,
    disposed: CancellationToken,
    transitions: AtomicUsize,
    teardowns: AtomicUsize,
}

impl ControllerInner {
    fn fire(&self, cause: ActivationCause) -> bool {
        let (guards, armed, latency) = {
            let mut state = self.state.lock();
            if state.unmounted {
                trace!(section = %self.section, cause = cause.as_str(), "fire after unmount ignored");
                return false;
            }
            if state.phase.is_activated() {
                drop(state);
                events::emit_duplicate_fire(&self.section, cause);
                return false;
            }
            let now = Instant::now();
            state.phase = ActivationPhase::Activated { cause };
            state.activated_at = Some(now);
            let latency = state.armed_at.map(|at| now.saturating_duration_since(at));
            (std::mem::take(&mut state.guards), state.armed, latency)
        };
        self.transitions.fetch_add(1, Ordering::SeqCst);
        self.phase_tx.send_replace(ActivationPhase::Activated { cause });
        events::emit_activated(&self.section, cause, latency);
        if armed {
            self.tear_down(guards, "activated");
        }
        true
    }

    /// Called once per controller lifetime, by the winning fire or by unmount.
    fn tear_down(&self, guards: Vec<TriggerGuard>, reason: &'static str) {
        let count = guards.len();
        for guard in guards {
            guard.disconnect();
        }
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        events::emit_torn_down(&self.section, count, reason);
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.unmounted && state.phase.is_pending() && state.armed {
            let guards = std::mem::take(&mut state.guards);
            events::emit_unmounted(&self.section, true);
            self.tear_down(guards, "dropped");
        }
    }
}

/// Weak firing capability handed to trigger tasks. Never keeps a section
/// alive; firing a dropped or unmounted controller is a no-op.
#[derive(Clone)]
pub struct FireHandle {
    section: SectionId,
    inner: Weak<ControllerInner>,
}

impl FireHandle {
    pub fn fire(&self, cause: ActivationCause) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.fire(cause),
            None => false,
        }
    }

    pub fn section(&self) -> &SectionId {
        &self.section
    }

    pub fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for FireHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FireHandle")
            .field("section", &self.section)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Per-section activation state machine. `Pending` until exactly one source
/// fires; clones share the same state.
#[derive(Clone)]
pub struct ActivationController {
    inner: Arc<ControllerInner>,
}

impl ActivationController {
    pub fn new(section: SectionId) -> Self {
        let (phase_tx, _) = watch::channel(ActivationPhase::Pending);
        Self {
            inner: Arc::new(ControllerInner {
                section,
                state: Mutex::new(ControllerState {
                    phase: ActivationPhase::Pending,
                    armed: false,
                    unmounted: false,
                    guards: Vec::new(),
                    armed_at: None,
                    activated_at: None,
                }),
                phase_tx,
                disposed: CancellationToken::new(),
                transitions: AtomicUsize::new(0),
                teardowns: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates the controller for a resolved plan. Immediate plans come back
    /// already activated with nothing registered.
    pub fn mount(section: SectionId, plan: &ActivationPlan) -> Self {
        let controller = Self::new(section);
        match plan.immediate_cause() {
            Some(cause) => {
                controller.fire(cause);
            }
            None => {
                controller.arm(plan);
            }
        }
        controller
    }

    /// Starts listening per `plan`. No-op once armed, activated or unmounted.
    pub fn arm(&self, plan: &ActivationPlan) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.unmounted || state.armed || state.phase.is_activated() {
                return false;
            }
            state.armed = true;
            state.armed_at = Some(Instant::now());
        }
        // Outside a runtime no timer could ever fire, so the section degrades
        // like any host missing a primitive.
        let cause = plan.immediate_cause().or_else(|| {
            (plan.needs_executor() && Handle::try_current().is_err())
                .then_some(ActivationCause::CapabilityMissing)
        });
        if let Some(cause) = cause {
            events::emit_armed(&self.inner.section, None, 0);
            self.fire(cause);
            return true;
        }

        let handle = self.fire_handle();
        let guards: Vec<TriggerGuard> = plan
            .triggers()
            .into_iter()
            .map(|trigger| trigger.start(handle.clone()))
            .collect();

        let mut state = self.inner.state.lock();
        if state.phase.is_activated() || state.unmounted {
            // A trigger fired (or unmount ran) while the others were starting.
            drop(state);
            for guard in guards {
                guard.disconnect();
            }
            return true;
        }
        let listeners = guards.iter().filter(|guard| !guard.is_inert()).count();
        state.guards.extend(guards);
        drop(state);
        events::emit_armed(&self.inner.section, plan.kind(), listeners);
        true
    }

    /// `Pending -> Activated`. Returns `true` for the single winning call.
    pub fn fire(&self, cause: ActivationCause) -> bool {
        self.inner.fire(cause)
    }

    /// Disposes the controller. Pending trigger machinery is released before
    /// this returns and later fires are ignored.
    pub fn unmount(&self) -> bool {
        let (guards, pending, armed) = {
            let mut state = self.inner.state.lock();
            if state.unmounted {
                return false;
            }
            state.unmounted = true;
            (
                std::mem::take(&mut state.guards),
                state.phase.is_pending(),
                state.armed,
            )
        };
        self.inner.disposed.cancel();
        events::emit_unmounted(&self.inner.section, pending);
        if pending && armed {
            self.inner.tear_down(guards, "unmounted");
        }
        true
    }

    pub fn fire_handle(&self) -> FireHandle {
        FireHandle {
            section: self.inner.section.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn section(&self) -> &SectionId {
        &self.inner.section
    }

    pub fn phase(&self) -> ActivationPhase {
        self.inner.state.lock().phase
    }

    pub fn is_activated(&self) -> bool {
        self.phase().is_activated()
    }

    pub fn is_unmounted(&self) -> bool {
        self.inner.state.lock().unmounted
    }

    pub fn subscribe(&self) -> watch::Receiver<ActivationPhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Resolves with the winning cause, or fails if the controller is
    /// unmounted first.
    pub async fn activated(&self) -> Result<ActivationCause, ActivationError> {
        let mut phases = self.inner.phase_tx.subscribe();
        let disposed = self.inner.disposed.clone();
        let activation = async move {
            phases
                .wait_for(ActivationPhase::is_activated)
                .await
                .ok()
                .and_then(|phase| phase.cause())
        };
        let cause = tokio::select! {
            biased;
            cause = activation => cause,
            _ = disposed.cancelled() => self.phase().cause(),
        };
        cause.ok_or_else(|| ActivationError::Unmounted(self.inner.section.clone()))
    }

    /// Live trigger registrations (timers, subscriptions, observers).
    pub fn listener_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .guards
            .iter()
            .filter(|guard| !guard.is_inert())
            .count()
    }

    pub fn transition_count(&self) -> usize {
        self.inner.transitions.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.inner.teardowns.load(Ordering::SeqCst)
    }

    /// Time from arming to activation, when both happened.
    pub fn activation_latency(&self) -> Option<Duration> {
        let state = self.inner.state.lock();
        match (state.armed_at, state.activated_at) {
            (Some(armed), Some(activated)) => Some(activated.saturating_duration_since(armed)),
            _ => None,
        }
    }
}

impl fmt::Debug for ActivationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationController")
            .field("section", &self.inner.section)
            .field("phase", &self.phase())
            .finish()
    }
}
