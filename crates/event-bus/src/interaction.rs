//! Document-wide user interaction channel.
//!
//! The host publishes each scroll, pointer-down, key-down and touch-start once;
//! sections subscribe and unsubscribe instead of attaching their own global
//! listeners.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::InMemoryBus;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Scroll,
    PointerDown,
    KeyDown,
    TouchStart,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 4] = [
        InteractionKind::Scroll,
        InteractionKind::PointerDown,
        InteractionKind::KeyDown,
        InteractionKind::TouchStart,
    ];

    /// DOM event name the host maps onto this kind.
    pub fn dom_event(self) -> &'static str {
        match self {
            InteractionKind::Scroll => "scroll",
            InteractionKind::PointerDown => "pointerdown",
            InteractionKind::KeyDown => "keydown",
            InteractionKind::TouchStart => "touchstart",
        }
    }

    pub fn from_dom_event(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.dom_event().eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InteractionEvent {
    pub kind: InteractionKind,
}

impl InteractionEvent {
    pub fn new(kind: InteractionKind) -> Self {
        Self { kind }
    }
}

pub type InteractionBus = InMemoryBus<InteractionEvent>;

pub fn interaction_bus(capacity: usize) -> Arc<InteractionBus> {
    InMemoryBus::new(capacity)
}

impl InMemoryBus<InteractionEvent> {
    /// Host entry point for a raw DOM event. Unknown event names are ignored.
    pub fn notify_dom_event(&self, name: &str) -> usize {
        match InteractionKind::from_dom_event(name) {
            Some(kind) => {
                let delivered = self.dispatch(InteractionEvent::new(kind));
                trace!(target: "event-bus", event = name, delivered, "interaction dispatched");
                delivered
            }
            None => 0,
        }
    }
}
