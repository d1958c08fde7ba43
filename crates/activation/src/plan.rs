use std::sync::Arc;
use std::time::Duration;

use pagedefer_core_types::{ElementId, Priority, TriggerKind};
use pagedefer_event_bus::InteractionBus;

use crate::host::{HostCapabilities, IntersectionHost};
use crate::model::{ActivationCause, ActivationDefaults, TriggerConfig};
use crate::triggers::{
    ActivationTrigger, CeilingTrigger, IdleSource, IdleTrigger, InteractionTrigger, ManualTrigger,
    ProximityTrigger,
};

/// What a section declares about itself.
#[derive(Clone, Debug)]
pub struct PlanInput {
    pub element: ElementId,
    pub priority: Priority,
    pub default_expanded: bool,
    pub config: TriggerConfig,
}

impl PlanInput {
    pub fn new(element: ElementId, priority: Priority) -> Self {
        Self {
            element,
            priority,
            default_expanded: false,
            config: TriggerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TriggerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn expanded(mut self, default_expanded: bool) -> Self {
        self.default_expanded = default_expanded;
        self
    }
}

/// Primary condition chosen for a section after capability detection.
#[derive(Clone, Debug)]
pub enum PlannedTrigger {
    Immediate {
        cause: ActivationCause,
    },
    Idle {
        source: IdleSource,
        timeout: Duration,
        min_delay: Duration,
    },
    Interaction {
        bus: Arc<InteractionBus>,
        ceiling: Duration,
        min_delay: Duration,
    },
    Proximity {
        host: Arc<dyn IntersectionHost>,
        element: ElementId,
        root_margin_px: u32,
        min_delay: Duration,
    },
    Manual,
}

/// Resolved, capability-checked activation plan for one section.
#[derive(Clone, Debug)]
pub struct ActivationPlan {
    primary: PlannedTrigger,
    ceiling: Option<Duration>,
}

impl ActivationPlan {
    pub fn immediate(cause: ActivationCause) -> Self {
        Self {
            primary: PlannedTrigger::Immediate { cause },
            ceiling: None,
        }
    }

    pub fn new(primary: PlannedTrigger, ceiling: Option<Duration>) -> Self {
        let ceiling = match primary {
            PlannedTrigger::Immediate { .. } | PlannedTrigger::Manual => None,
            _ => ceiling,
        };
        Self { primary, ceiling }
    }

    /// Picks the strategy for `input`, consulting `host` exactly once. A
    /// strategy whose host primitive is missing degrades to immediate
    /// activation, except idle which falls back to a fixed delay.
    pub fn resolve(
        input: &PlanInput,
        defaults: &ActivationDefaults,
        host: &HostCapabilities,
    ) -> Self {
        if input.priority == Priority::High || input.default_expanded {
            return Self::immediate(ActivationCause::Immediate);
        }
        let config = &input.config;
        let strategy = config
            .strategy
            .or_else(|| defaults.strategy_for(input.priority))
            .unwrap_or(defaults.medium_strategy);
        let min_delay = config
            .min_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_delay);
        let fallback = config.fallback_ms.map(Duration::from_millis);

        match strategy {
            TriggerKind::Idle => {
                let source = match &host.idle {
                    Some(scheduler) => IdleSource::Host(Arc::clone(scheduler)),
                    None => IdleSource::FixedDelay(defaults.idle_fallback_delay),
                };
                Self::new(
                    PlannedTrigger::Idle {
                        source,
                        timeout: defaults.idle_timeout,
                        min_delay,
                    },
                    fallback,
                )
            }
            TriggerKind::Interaction => match &host.interactions {
                Some(bus) => Self::new(
                    PlannedTrigger::Interaction {
                        bus: Arc::clone(bus),
                        ceiling: fallback.unwrap_or(defaults.interaction_ceiling),
                        min_delay,
                    },
                    None,
                ),
                None => Self::immediate(ActivationCause::CapabilityMissing),
            },
            TriggerKind::Proximity => match &host.viewport {
                Some(viewport) => Self::new(
                    PlannedTrigger::Proximity {
                        host: Arc::clone(viewport),
                        element: input.element.clone(),
                        root_margin_px: config.root_margin_px.unwrap_or(defaults.root_margin_px),
                        min_delay,
                    },
                    Some(fallback.unwrap_or(defaults.proximity_fallback)),
                ),
                None => Self::immediate(ActivationCause::CapabilityMissing),
            },
            TriggerKind::Manual => Self::new(PlannedTrigger::Manual, None),
        }
    }

    pub fn primary(&self) -> &PlannedTrigger {
        &self.primary
    }

    pub fn ceiling(&self) -> Option<Duration> {
        self.ceiling
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self.primary, PlannedTrigger::Immediate { .. })
    }

    /// Whether arming starts timer or host-wait tasks on the tokio runtime.
    pub fn needs_executor(&self) -> bool {
        self.ceiling.is_some()
            || matches!(
                self.primary,
                PlannedTrigger::Idle { .. }
                    | PlannedTrigger::Interaction { .. }
                    | PlannedTrigger::Proximity { .. }
            )
    }

    pub fn immediate_cause(&self) -> Option<ActivationCause> {
        match self.primary {
            PlannedTrigger::Immediate { cause } => Some(cause),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<TriggerKind> {
        match self.primary {
            PlannedTrigger::Immediate { .. } => None,
            PlannedTrigger::Idle { .. } => Some(TriggerKind::Idle),
            PlannedTrigger::Interaction { .. } => Some(TriggerKind::Interaction),
            PlannedTrigger::Proximity { .. } => Some(TriggerKind::Proximity),
            PlannedTrigger::Manual => Some(TriggerKind::Manual),
        }
    }

    /// Fresh trigger instances for one arming: the primary, then the ceiling.
    pub fn triggers(&self) -> Vec<Box<dyn ActivationTrigger>> {
        let mut triggers: Vec<Box<dyn ActivationTrigger>> = Vec::with_capacity(2);
        match &self.primary {
            PlannedTrigger::Immediate { .. } => return triggers,
            PlannedTrigger::Idle {
                source,
                timeout,
                min_delay,
            } => triggers.push(Box::new(IdleTrigger::new(
                source.clone(),
                *timeout,
                *min_delay,
            ))),
            PlannedTrigger::Interaction {
                bus,
                ceiling,
                min_delay,
            } => triggers.push(Box::new(InteractionTrigger::new(
                Arc::clone(bus),
                *ceiling,
                *min_delay,
            ))),
            PlannedTrigger::Proximity {
                host,
                element,
                root_margin_px,
                min_delay,
            } => triggers.push(Box::new(ProximityTrigger::new(
                Arc::clone(host),
                element.clone(),
                *root_margin_px,
                *min_delay,
            ))),
            PlannedTrigger::Manual => triggers.push(Box::new(ManualTrigger)),
        }
        if let Some(after) = self.ceiling {
            triggers.push(Box::new(CeilingTrigger::new(after)));
        }
        triggers
    }
}
