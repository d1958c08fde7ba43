use std::time::Duration;

use pagedefer_core_types::{Priority, TriggerKind};
use pagedefer_policy_center::PolicySnapshot;
use serde::{Deserialize, Serialize};

/// Which source won the race to activate a section.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationCause {
    /// High priority or expanded by default; never deferred.
    Immediate,
    Idle,
    /// The host idle window did not open before the idle timeout.
    IdleTimeout,
    Interaction,
    InteractionCeiling,
    Proximity,
    /// Root element missing or observation dropped by the host.
    Unobservable,
    Manual,
    Ceiling,
    /// Host lacks the primitive the strategy needs.
    CapabilityMissing,
}

impl ActivationCause {
    pub const ALL: [ActivationCause; 10] = [
        ActivationCause::Immediate,
        ActivationCause::Idle,
        ActivationCause::IdleTimeout,
        ActivationCause::Interaction,
        ActivationCause::InteractionCeiling,
        ActivationCause::Proximity,
        ActivationCause::Unobservable,
        ActivationCause::Manual,
        ActivationCause::Ceiling,
        ActivationCause::CapabilityMissing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivationCause::Immediate => "immediate",
            ActivationCause::Idle => "idle",
            ActivationCause::IdleTimeout => "idle_timeout",
            ActivationCause::Interaction => "interaction",
            ActivationCause::InteractionCeiling => "interaction_ceiling",
            ActivationCause::Proximity => "proximity",
            ActivationCause::Unobservable => "unobservable",
            ActivationCause::Manual => "manual",
            ActivationCause::Ceiling => "ceiling",
            ActivationCause::CapabilityMissing => "capability_missing",
        }
    }

    pub fn index(self) -> usize {
        match self {
            ActivationCause::Immediate => 0,
            ActivationCause::Idle => 1,
            ActivationCause::IdleTimeout => 2,
            ActivationCause::Interaction => 3,
            ActivationCause::InteractionCeiling => 4,
            ActivationCause::Proximity => 5,
            ActivationCause::Unobservable => 6,
            ActivationCause::Manual => 7,
            ActivationCause::Ceiling => 8,
            ActivationCause::CapabilityMissing => 9,
        }
    }
}

/// Phase of one section. There is no way back from `Activated`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActivationPhase {
    Pending,
    Activated { cause: ActivationCause },
}

impl ActivationPhase {
    pub fn is_activated(&self) -> bool {
        matches!(self, ActivationPhase::Activated { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ActivationPhase::Pending)
    }

    pub fn cause(&self) -> Option<ActivationCause> {
        match self {
            ActivationPhase::Pending => None,
            ActivationPhase::Activated { cause } => Some(*cause),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationPhase::Pending => "pending",
            ActivationPhase::Activated { .. } => "activated",
        }
    }
}

/// Per-section trigger settings. Unset fields fall back to [`ActivationDefaults`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub strategy: Option<TriggerKind>,
    pub root_margin_px: Option<u32>,
    pub min_delay_ms: Option<u64>,
    pub fallback_ms: Option<u64>,
}

impl TriggerConfig {
    pub fn strategy(mut self, strategy: TriggerKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn root_margin(mut self, px: u32) -> Self {
        self.root_margin_px = Some(px);
        self
    }

    pub fn min_delay(mut self, ms: u64) -> Self {
        self.min_delay_ms = Some(ms);
        self
    }

    pub fn fallback(mut self, ms: u64) -> Self {
        self.fallback_ms = Some(ms);
        self
    }
}

/// Engine-wide defaults, normally derived from the policy snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationDefaults {
    pub min_delay: Duration,
    pub idle_timeout: Duration,
    pub idle_fallback_delay: Duration,
    pub interaction_ceiling: Duration,
    pub proximity_fallback: Duration,
    pub root_margin_px: u32,
    pub medium_strategy: TriggerKind,
    pub low_strategy: TriggerKind,
}

impl Default for ActivationDefaults {
    fn default() -> Self {
        Self::from(&pagedefer_policy_center::default_snapshot())
    }
}

impl ActivationDefaults {
    pub fn strategy_for(&self, priority: Priority) -> Option<TriggerKind> {
        match priority {
            Priority::High => None,
            Priority::Medium => Some(self.medium_strategy),
            Priority::Low => Some(self.low_strategy),
        }
    }
}

impl From<&PolicySnapshot> for ActivationDefaults {
    fn from(snapshot: &PolicySnapshot) -> Self {
        let activation = &snapshot.activation;
        Self {
            min_delay: Duration::from_millis(activation.min_delay_ms),
            idle_timeout: Duration::from_millis(activation.idle_timeout_ms),
            idle_fallback_delay: Duration::from_millis(activation.idle_fallback_delay_ms),
            interaction_ceiling: Duration::from_millis(activation.interaction_ceiling_ms),
            proximity_fallback: Duration::from_millis(activation.proximity_fallback_ms),
            root_margin_px: activation.root_margin_px,
            medium_strategy: snapshot.priorities.medium,
            low_strategy: snapshot.priorities.low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_policy_snapshot() {
        let defaults = ActivationDefaults::default();
        assert_eq!(defaults.min_delay, Duration::from_millis(100));
        assert_eq!(defaults.interaction_ceiling, Duration::from_secs(3));
        assert_eq!(defaults.strategy_for(Priority::High), None);
        assert_eq!(defaults.strategy_for(Priority::Medium), Some(TriggerKind::Idle));
    }

    #[test]
    fn trigger_config_deserializes_partial_input() {
        let config: TriggerConfig =
            serde_json::from_str(r#"{"strategy":"proximity","root_margin_px":1000}"#).unwrap();
        assert_eq!(config.strategy, Some(TriggerKind::Proximity));
        assert_eq!(config.root_margin_px, Some(1000));
        assert_eq!(config.fallback_ms, None);
    }
}
