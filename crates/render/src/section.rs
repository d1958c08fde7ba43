use std::fmt;

use pagedefer_activation::{ActivationPhase, PlanInput, TriggerConfig};
use pagedefer_core_types::{AnchorId, ElementId, Priority, SectionId};

use crate::content::RenderableContent;

/// Declared shape of one page section.
#[derive(Clone)]
pub struct SectionSpec {
    pub id: SectionId,
    pub title: Option<String>,
    pub summary: Option<RenderableContent>,
    pub content: RenderableContent,
    pub priority: Priority,
    pub default_expanded: bool,
    pub trigger: TriggerConfig,
}

impl SectionSpec {
    pub fn new(id: impl Into<String>, content: RenderableContent) -> Self {
        Self {
            id: SectionId::new(id),
            title: None,
            summary: None,
            content,
            priority: Priority::default(),
            default_expanded: false,
            trigger: TriggerConfig::default(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn summary(mut self, summary: RenderableContent) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn default_expanded(mut self, expanded: bool) -> Self {
        self.default_expanded = expanded;
        self
    }

    pub fn trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn anchor(&self) -> AnchorId {
        self.id.anchor()
    }

    /// The region root is observed under its anchor.
    pub fn plan_input(&self) -> PlanInput {
        PlanInput::new(ElementId::from(&self.anchor()), self.priority)
            .expanded(self.default_expanded)
            .with_config(self.trigger.clone())
    }

    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

impl fmt::Debug for SectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionSpec")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("has_summary", &self.summary.is_some())
            .field("priority", &self.priority)
            .field("default_expanded", &self.default_expanded)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Visibility of a collapsible section's panel. Independent of activation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExpandState {
    Expanded,
    Collapsed,
}

impl ExpandState {
    pub fn is_expanded(self) -> bool {
        matches!(self, ExpandState::Expanded)
    }

    pub fn toggled(self) -> Self {
        match self {
            ExpandState::Expanded => ExpandState::Collapsed,
            ExpandState::Collapsed => ExpandState::Expanded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExpandState::Expanded => "expanded",
            ExpandState::Collapsed => "collapsed",
        }
    }

    /// Expand state when the user has not chosen one. Activation alone never
    /// expands a low priority section on a constrained viewport.
    pub fn derive(spec: &SectionSpec, phase: ActivationPhase, constrained: bool) -> Self {
        if spec.default_expanded || spec.priority == Priority::High {
            return ExpandState::Expanded;
        }
        match phase {
            ActivationPhase::Pending => ExpandState::Collapsed,
            ActivationPhase::Activated { .. } if spec.priority == Priority::Low && constrained => {
                ExpandState::Collapsed
            }
            ActivationPhase::Activated { .. } => ExpandState::Expanded,
        }
    }
}
