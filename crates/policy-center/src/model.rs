use std::collections::HashMap;

use pagedefer_core_types::{Priority, TriggerKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub rev: u64,
    pub activation: ActivationPolicy,
    pub priorities: PriorityPolicy,
    pub viewport: ViewportPolicy,
    pub features: FeatureFlags,
    #[serde(default)]
    pub provenance: HashMap<String, PolicyProvenance>,
}

/// Timing and distance parameters of the trigger strategies.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivationPolicy {
    /// Settle delay after a strategy condition is met.
    pub min_delay_ms: u64,
    /// Longest wait for the host idle window.
    pub idle_timeout_ms: u64,
    /// Fixed delay used when the host has no idle primitive.
    pub idle_fallback_delay_ms: u64,
    /// Unconditional activation for the interaction strategy.
    pub interaction_ceiling_ms: u64,
    /// Unconditional activation for the proximity strategy.
    pub proximity_fallback_ms: u64,
    pub root_margin_px: u32,
}

/// Default strategy per priority class. `high` always mounts immediately.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityPolicy {
    pub medium: TriggerKind,
    pub low: TriggerKind,
}

impl PriorityPolicy {
    pub fn strategy_for(&self, priority: Priority) -> Option<TriggerKind> {
        match priority {
            Priority::High => None,
            Priority::Medium => Some(self.medium),
            Priority::Low => Some(self.low),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewportPolicy {
    /// Viewports at or below this width count as constrained.
    pub constrained_max_width_px: u32,
}

impl ViewportPolicy {
    pub fn is_constrained(&self, width_px: u32) -> bool {
        width_px <= self.constrained_max_width_px
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureFlags {
    pub table_of_contents: bool,
    pub streaming_shell: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicySource {
    Builtin,
    File,
    Env,
    Cli,
}

impl PolicySnapshot {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }

    pub fn source_of(&self, path: &str) -> Option<PolicySource> {
        self.provenance.get(path).map(|entry| entry.source)
    }
}
