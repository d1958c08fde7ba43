use std::fmt;

use pagedefer_activation::{ActivationCause, ActivationController, ActivationPhase};
use pagedefer_core_types::{AnchorId, SectionId};
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::RenderError;
use crate::node::{Element, Node, VISUALLY_HIDDEN};
use crate::section::{ExpandState, SectionSpec};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnitMode {
    /// Content-agnostic deferral: placeholder, then content.
    Lazy,
    /// Title and summary always rendered; content replaces the summary.
    Seo,
    /// Adds an expand/collapse control on top of activation.
    Collapsible,
}

impl UnitMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitMode::Lazy => "lazy",
            UnitMode::Seo => "seo",
            UnitMode::Collapsible => "collapsible",
        }
    }
}

/// Render-decision wrapper around one section and its controller.
pub struct DeferredUnit {
    spec: SectionSpec,
    mode: UnitMode,
    controller: ActivationController,
    constrained: bool,
    user_choice: Mutex<Option<ExpandState>>,
}

impl DeferredUnit {
    pub fn new(
        spec: SectionSpec,
        mode: UnitMode,
        controller: ActivationController,
        constrained: bool,
    ) -> Self {
        Self {
            spec,
            mode,
            controller,
            constrained,
            user_choice: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SectionId {
        &self.spec.id
    }

    pub fn anchor(&self) -> AnchorId {
        self.spec.anchor()
    }

    pub fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    pub fn mode(&self) -> UnitMode {
        self.mode
    }

    pub fn controller(&self) -> &ActivationController {
        &self.controller
    }

    pub fn phase(&self) -> ActivationPhase {
        self.controller.phase()
    }

    pub fn is_activated(&self) -> bool {
        self.controller.is_activated()
    }

    /// Explicit activation control, available in every mode.
    pub fn activate_now(&self) -> bool {
        self.controller.fire(ActivationCause::Manual)
    }

    /// `None` outside the collapsible mode.
    pub fn expand_state(&self) -> Option<ExpandState> {
        if self.mode != UnitMode::Collapsible {
            return None;
        }
        let choice = *self.user_choice.lock();
        Some(choice.unwrap_or_else(|| {
            ExpandState::derive(&self.spec, self.controller.phase(), self.constrained)
        }))
    }

    /// Expands the panel, activating the section first when still pending.
    /// Outside the collapsible mode this is the same as [`activate_now`](Self::activate_now).
    pub fn expand(&self) -> bool {
        if self.mode == UnitMode::Collapsible {
            *self.user_choice.lock() = Some(ExpandState::Expanded);
        }
        let fired = self.activate_now();
        debug!(section = %self.spec.id, fired, "section expanded");
        fired
    }

    /// Collapses the panel. Never deactivates or removes content.
    pub fn collapse(&self) {
        if self.mode == UnitMode::Collapsible {
            *self.user_choice.lock() = Some(ExpandState::Collapsed);
        }
    }

    pub fn toggle(&self) -> Option<ExpandState> {
        match self.expand_state()? {
            ExpandState::Expanded => self.collapse(),
            ExpandState::Collapsed => {
                self.expand();
            }
        }
        self.expand_state()
    }

    pub fn unmount(&self) -> bool {
        self.controller.unmount()
    }

    /// Region root for the current phase. Content errors propagate as-is.
    pub fn render(&self) -> Result<Node, RenderError> {
        let phase = self.controller.phase();
        let anchor = self.anchor();
        let mut root = Element::new("section")
            .attr("id", anchor.as_str())
            .attr("data-section", self.spec.id.as_str())
            .attr("data-mode", self.mode.as_str())
            .attr("data-phase", phase.as_str());
        if let Some(cause) = phase.cause() {
            root = root.attr("data-cause", cause.as_str());
        }

        let body = match self.mode {
            UnitMode::Lazy => self.render_lazy(phase)?,
            UnitMode::Seo => self.render_seo(phase, &anchor)?,
            UnitMode::Collapsible => {
                let state = self
                    .expand_state()
                    .unwrap_or(ExpandState::Collapsed);
                root = root.attr("data-expanded", state.is_expanded().to_string());
                self.render_collapsible(phase, state, &anchor)?
            }
        };
        Ok(root.children(body).into())
    }

    fn render_summary(&self) -> Result<Option<Node>, RenderError> {
        self.spec
            .summary
            .as_ref()
            .map(|summary| summary.render())
            .transpose()
    }

    fn render_lazy(&self, phase: ActivationPhase) -> Result<Vec<Node>, RenderError> {
        if phase.is_activated() {
            let content = self.spec.content.render()?;
            return Ok(vec![Element::new("div")
                .class("deferred-content")
                .child(content)
                .into()]);
        }
        let mut placeholder = Element::new("div")
            .class("deferred-placeholder")
            .attr("aria-busy", "true");
        if let Some(summary) = self.render_summary()? {
            placeholder = placeholder.child(summary);
        }
        Ok(vec![placeholder.into()])
    }

    fn render_seo(&self, phase: ActivationPhase, anchor: &AnchorId) -> Result<Vec<Node>, RenderError> {
        let mut nodes = Vec::with_capacity(2);
        if let Some(title) = &self.spec.title {
            nodes.push(
                Element::new("h2")
                    .attr("id", anchor.child("title"))
                    .text(title.clone())
                    .into(),
            );
        }
        if phase.is_activated() {
            nodes.push(
                Element::new("div")
                    .class("section-content")
                    .child(self.spec.content.render()?)
                    .into(),
            );
        } else {
            let mut summary = Element::new("div").class("section-summary");
            if let Some(rendered) = self.render_summary()? {
                summary = summary.child(rendered);
            }
            nodes.push(summary.into());
        }
        Ok(nodes)
    }

    fn render_collapsible(
        &self,
        phase: ActivationPhase,
        state: ExpandState,
        anchor: &AnchorId,
    ) -> Result<Vec<Node>, RenderError> {
        let panel_id = anchor.child("panel");
        let toggle_id = anchor.child("toggle");
        let header = Element::new("h2").child(
            Element::new("button")
                .attr("type", "button")
                .attr("id", toggle_id.clone())
                .attr("aria-expanded", state.is_expanded().to_string())
                .attr("aria-controls", panel_id.clone())
                .text(self.spec.label().to_string()),
        );

        let mut nodes: Vec<Node> = vec![header.into()];
        if let Some(rendered) = self.render_summary()? {
            // Demoted once content exists, but kept in the tree.
            nodes.push(
                Element::new("div")
                    .class("section-summary")
                    .class_if(phase.is_activated(), VISUALLY_HIDDEN)
                    .child(rendered)
                    .into(),
            );
        }
        let mut panel = Element::new("div")
            .attr("id", panel_id)
            .attr("role", "region")
            .attr("aria-labelledby", toggle_id)
            .class("section-panel")
            .class_if(!state.is_expanded(), VISUALLY_HIDDEN);
        if phase.is_activated() {
            panel = panel.child(self.spec.content.render()?);
        }
        nodes.push(panel.into());
        Ok(nodes)
    }
}

impl fmt::Debug for DeferredUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredUnit")
            .field("section", &self.spec.id)
            .field("mode", &self.mode)
            .field("phase", &self.controller.phase())
            .field("expand", &self.expand_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{content_fn, TextContent};
    use pagedefer_core_types::Priority;

    fn pending_unit(spec: SectionSpec, mode: UnitMode, constrained: bool) -> DeferredUnit {
        let controller = ActivationController::new(spec.id.clone());
        DeferredUnit::new(spec, mode, controller, constrained)
    }

    fn menu() -> SectionSpec {
        SectionSpec::new("menu", TextContent::shared("Full menu with prices"))
            .title("Menu")
            .summary(TextContent::shared("3 more items"))
    }

    #[test]
    fn lazy_placeholder_then_content() {
        let unit = pending_unit(menu(), UnitMode::Lazy, false);
        let pending = unit.render().unwrap();
        assert!(pending.contains_text("3 more items"));
        assert!(!pending.contains_text("Full menu"));
        assert_eq!(pending.find_by_attr("aria-busy", "true").len(), 1);

        assert!(unit.activate_now());
        let activated = unit.render().unwrap();
        assert!(activated.contains_text("Full menu"));
        assert!(activated.find_by_class("deferred-placeholder").is_empty());
        assert_eq!(
            activated.find_by_id("menu").and_then(|e| e.get_attr("data-phase")),
            Some("activated")
        );
    }

    #[test]
    fn seo_keeps_title_and_summary_while_pending() {
        let unit = pending_unit(menu(), UnitMode::Seo, false);
        let pending = unit.render().unwrap();
        assert!(pending.find_by_id("menu-title").is_some());
        assert!(pending.contains_text("3 more items"));

        unit.activate_now();
        let activated = unit.render().unwrap();
        assert!(activated.find_by_id("menu-title").is_some());
        assert!(activated.contains_text("Full menu"));
        assert!(!activated.contains_text("3 more items"));
    }

    #[test]
    fn collapsible_summary_is_hidden_not_removed() {
        let unit = pending_unit(menu().priority(Priority::Low), UnitMode::Collapsible, true);
        let pending = unit.render().unwrap();
        let button = pending.find_by_id("menu-toggle").unwrap();
        assert_eq!(button.get_attr("aria-expanded"), Some("false"));
        assert_eq!(button.get_attr("aria-controls"), Some("menu-panel"));
        assert!(pending.find_by_class(VISUALLY_HIDDEN).iter().all(|e| !e.has_class("section-summary")));

        unit.activate_now();
        assert_eq!(unit.expand_state(), Some(ExpandState::Collapsed));
        let activated = unit.render().unwrap();
        let summary = activated.find_by_class("section-summary");
        assert_eq!(summary.len(), 1);
        assert!(summary[0].is_visually_hidden());
        assert!(summary[0].get_attr("aria-hidden").is_none());
        let panel = activated.find_by_id("menu-panel").unwrap();
        assert!(panel.is_visually_hidden());
        assert!(activated.contains_text("Full menu"));
    }

    #[test]
    fn expanding_a_pending_collapsible_activates_it() {
        let unit = pending_unit(menu(), UnitMode::Collapsible, false);
        assert_eq!(unit.expand_state(), Some(ExpandState::Collapsed));
        assert!(unit.expand());
        assert_eq!(unit.phase().cause(), Some(ActivationCause::Manual));
        let panel = unit.render().unwrap();
        assert!(!panel.find_by_id("menu-panel").unwrap().is_visually_hidden());

        assert_eq!(unit.toggle(), Some(ExpandState::Collapsed));
        assert!(unit.is_activated());
        assert_eq!(unit.toggle(), Some(ExpandState::Expanded));
        assert_eq!(unit.controller().transition_count(), 1);
    }

    #[test]
    fn content_errors_propagate() {
        let spec = SectionSpec::new(
            "map",
            content_fn(|| Err(RenderError::content("tiles unavailable"))),
        );
        let unit = pending_unit(spec, UnitMode::Lazy, false);
        assert!(unit.render().is_ok());
        unit.activate_now();
        assert_eq!(
            unit.render().unwrap_err(),
            RenderError::Content("tiles unavailable".into())
        );
    }

    #[test]
    fn non_collapsible_units_have_no_expand_state() {
        let unit = pending_unit(menu(), UnitMode::Seo, false);
        assert_eq!(unit.expand_state(), None);
        assert_eq!(unit.toggle(), None);
    }
}
