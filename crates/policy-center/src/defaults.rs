use pagedefer_core_types::TriggerKind;

use crate::model::{
    ActivationPolicy, FeatureFlags, PolicySnapshot, PriorityPolicy, ViewportPolicy,
};

pub fn default_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        rev: 1,
        activation: ActivationPolicy {
            min_delay_ms: 100,
            idle_timeout_ms: 2_000,
            idle_fallback_delay_ms: 200,
            interaction_ceiling_ms: 3_000,
            proximity_fallback_ms: 5_000,
            root_margin_px: 800,
        },
        priorities: PriorityPolicy {
            medium: TriggerKind::Idle,
            low: TriggerKind::Proximity,
        },
        viewport: ViewportPolicy {
            constrained_max_width_px: 768,
        },
        features: FeatureFlags {
            table_of_contents: true,
            streaming_shell: true,
        },
        provenance: Default::default(),
    }
}
