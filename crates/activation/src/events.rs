use std::time::Duration;

use pagedefer_core_types::{SectionId, TriggerKind};
use tracing::debug;

use crate::metrics;
use crate::model::ActivationCause;

pub fn emit_armed(section: &SectionId, kind: Option<TriggerKind>, listeners: usize) {
    metrics::record_armed();
    debug!(
        target: "activation.events",
        %section,
        strategy = kind.map(TriggerKind::as_str).unwrap_or("immediate"),
        listeners,
        "section.armed"
    );
}

pub fn emit_activated(section: &SectionId, cause: ActivationCause, latency: Option<Duration>) {
    metrics::record_activated(cause);
    debug!(
        target: "activation.events",
        %section,
        cause = cause.as_str(),
        latency_ms = latency.map(|d| d.as_millis() as u64),
        "section.activated"
    );
}

pub fn emit_torn_down(section: &SectionId, guards: usize, reason: &'static str) {
    metrics::record_torn_down(guards);
    debug!(
        target: "activation.events",
        %section,
        guards,
        reason,
        "section.torn_down"
    );
}

pub fn emit_duplicate_fire(section: &SectionId, cause: ActivationCause) {
    metrics::record_duplicate_fire();
    debug!(
        target: "activation.events",
        %section,
        cause = cause.as_str(),
        "section.duplicate_fire"
    );
}

pub fn emit_unmounted(section: &SectionId, pending: bool) {
    if pending {
        metrics::record_unmounted_pending();
    }
    debug!(
        target: "activation.events",
        %section,
        pending,
        "section.unmounted"
    );
}
