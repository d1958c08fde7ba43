//! In-process intersection host: a scrollable viewport over laid-out element
//! boxes. Drives the CLI simulation and the trigger tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use pagedefer_core_types::ElementId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ObserveError;
use crate::host::{IntersectCallback, IntersectionHost, Observation};

/// Vertical extent of an element in document coordinates (px).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ElementBox {
    pub top: i64,
    pub height: i64,
}

impl ElementBox {
    pub fn new(top: i64, height: i64) -> Self {
        Self {
            top,
            height: height.max(0),
        }
    }

    fn intersects(&self, scroll_y: i64, viewport_height: i64, margin: i64) -> bool {
        let reach_below = scroll_y.saturating_add(viewport_height).saturating_add(margin);
        let reach_above = scroll_y.saturating_sub(margin);
        self.top <= reach_below && self.top.saturating_add(self.height) >= reach_above
    }
}

struct ObserverEntry {
    element: ElementId,
    root_margin_px: u32,
    on_enter: IntersectCallback,
}

struct ViewportState {
    width: u32,
    height: u32,
    scroll_y: i64,
    elements: HashMap<ElementId, ElementBox>,
    observers: HashMap<u64, ObserverEntry>,
    next_observer: u64,
}

pub struct SimulatedViewport {
    state: Arc<Mutex<ViewportState>>,
}

impl SimulatedViewport {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(ViewportState {
                width,
                height,
                scroll_y: 0,
                elements: HashMap::new(),
                observers: HashMap::new(),
                next_observer: 0,
            })),
        })
    }

    pub fn mount_element(&self, element: ElementId, bounds: ElementBox) {
        self.state.lock().elements.insert(element, bounds);
        self.evaluate();
    }

    /// Removes the element and every observer watching it. Those observers
    /// are dropped without their callback running.
    pub fn unmount_element(&self, element: &ElementId) -> bool {
        let mut state = self.state.lock();
        let removed = state.elements.remove(element).is_some();
        let dropped: Vec<ObserverEntry> = {
            let ids: Vec<u64> = state
                .observers
                .iter()
                .filter(|(_, entry)| &entry.element == element)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.observers.remove(&id))
                .collect()
        };
        drop(state);
        drop(dropped);
        removed
    }

    pub fn scroll_to(&self, y: i64) {
        self.state.lock().scroll_y = y.max(0);
        self.evaluate();
    }

    pub fn scroll_by(&self, dy: i64) {
        {
            let mut state = self.state.lock();
            state.scroll_y = state.scroll_y.saturating_add(dy).max(0);
        }
        self.evaluate();
    }

    pub fn resize(&self, width: u32, height: u32) {
        {
            let mut state = self.state.lock();
            state.width = width;
            state.height = height;
        }
        self.evaluate();
    }

    pub fn scroll_y(&self) -> i64 {
        self.state.lock().scroll_y
    }

    pub fn width(&self) -> u32 {
        self.state.lock().width
    }

    pub fn height(&self) -> u32 {
        self.state.lock().height
    }

    pub fn is_mounted(&self, element: &ElementId) -> bool {
        self.state.lock().elements.contains_key(element)
    }

    pub fn element_box(&self, element: &ElementId) -> Option<ElementBox> {
        self.state.lock().elements.get(element).copied()
    }

    /// Whether `element` is currently inside the viewport (no margin).
    pub fn is_visible(&self, element: &ElementId) -> bool {
        let state = self.state.lock();
        state
            .elements
            .get(element)
            .map(|bounds| bounds.intersects(state.scroll_y, i64::from(state.height), 0))
            .unwrap_or(false)
    }

    /// Detaches every observer whose element entered its margin and runs the
    /// callbacks outside the lock.
    fn evaluate(&self) {
        let due: Vec<ObserverEntry> = {
            let mut state = self.state.lock();
            let scroll_y = state.scroll_y;
            let height = i64::from(state.height);
            let ids: Vec<u64> = state
                .observers
                .iter()
                .filter(|(_, entry)| {
                    state
                        .elements
                        .get(&entry.element)
                        .map(|bounds| {
                            bounds.intersects(scroll_y, height, i64::from(entry.root_margin_px))
                        })
                        .unwrap_or(false)
                })
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.observers.remove(&id))
                .collect()
        };
        for entry in due {
            trace!(element = %entry.element, margin = entry.root_margin_px, "viewport.intersect");
            (entry.on_enter)();
        }
    }
}

impl IntersectionHost for SimulatedViewport {
    fn observe(
        &self,
        element: &ElementId,
        root_margin_px: u32,
        on_enter: IntersectCallback,
    ) -> Result<Observation, ObserveError> {
        let id = {
            let mut state = self.state.lock();
            if !state.elements.contains_key(element) {
                return Err(ObserveError::NotMounted(element.clone()));
            }
            let id = state.next_observer;
            state.next_observer += 1;
            state.observers.insert(
                id,
                ObserverEntry {
                    element: element.clone(),
                    root_margin_px,
                    on_enter,
                },
            );
            id
        };
        let registry: Weak<Mutex<ViewportState>> = Arc::downgrade(&self.state);
        let observation = Observation::new(move || {
            if let Some(state) = registry.upgrade() {
                let entry = state.lock().observers.remove(&id);
                drop(entry);
            }
        });
        // An element already within the margin reports right away.
        self.evaluate();
        Ok(observation)
    }

    fn active_observations(&self) -> usize {
        self.state.lock().observers.len()
    }
}

impl fmt::Debug for SimulatedViewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedViewport")
            .field("width", &state.width)
            .field("height", &state.height)
            .field("scroll_y", &state.scroll_y)
            .field("elements", &state.elements.len())
            .field("observers", &state.observers.len())
            .finish()
    }
}
