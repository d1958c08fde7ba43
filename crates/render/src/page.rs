use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use pagedefer_activation::{
    ActivationController, ActivationDefaults, ActivationPlan, HostCapabilities,
};
use pagedefer_core_types::{PageId, SectionId};
use pagedefer_policy_center::PolicySnapshot;
use tracing::{debug, info};

use crate::content::Content;
use crate::errors::RenderError;
use crate::node::{Element, Node};
use crate::section::SectionSpec;
use crate::streaming::streaming_yield;
use crate::unit::{DeferredUnit, UnitMode};

const SHELL_CLOSE: &str = "</main></body></html>";

/// Everything needed to turn a section declaration into a mounted unit.
#[derive(Clone, Debug)]
pub struct PageRuntime {
    host: HostCapabilities,
    defaults: ActivationDefaults,
    constrained: bool,
}

impl PageRuntime {
    pub fn new(host: HostCapabilities, defaults: ActivationDefaults) -> Self {
        Self {
            host,
            defaults,
            constrained: false,
        }
    }

    /// Derives defaults and the constrained flag from policy and the
    /// current viewport width.
    pub fn from_policy(snapshot: &PolicySnapshot, host: HostCapabilities, viewport_width: u32) -> Self {
        Self {
            host,
            defaults: ActivationDefaults::from(snapshot),
            constrained: snapshot.viewport.is_constrained(viewport_width),
        }
    }

    pub fn constrained(mut self, constrained: bool) -> Self {
        self.constrained = constrained;
        self
    }

    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    pub fn host(&self) -> &HostCapabilities {
        &self.host
    }

    pub fn defaults(&self) -> &ActivationDefaults {
        &self.defaults
    }

    pub fn plan(&self, spec: &SectionSpec) -> ActivationPlan {
        ActivationPlan::resolve(&spec.plan_input(), &self.defaults, &self.host)
    }

    /// Resolves the plan and mounts the controller. Deferred plans start
    /// their triggers here, so this needs a tokio runtime.
    pub fn mount(&self, spec: SectionSpec, mode: UnitMode) -> DeferredUnit {
        let plan = self.plan(&spec);
        debug!(
            section = %spec.id,
            mode = mode.as_str(),
            strategy = plan.kind().map(|k| k.as_str()).unwrap_or("immediate"),
            "mounting section"
        );
        let controller = ActivationController::mount(spec.id.clone(), &plan);
        DeferredUnit::new(spec, mode, controller, self.constrained)
    }

    pub fn mount_lazy(&self, spec: SectionSpec) -> DeferredUnit {
        self.mount(spec, UnitMode::Lazy)
    }

    pub fn mount_seo(&self, spec: SectionSpec) -> DeferredUnit {
        self.mount(spec, UnitMode::Seo)
    }

    pub fn mount_collapsible(&self, spec: SectionSpec) -> DeferredUnit {
        self.mount(spec, UnitMode::Collapsible)
    }
}

impl Content for DeferredUnit {
    fn render(&self) -> Result<Node, RenderError> {
        DeferredUnit::render(self)
    }
}

/// An assembled page of deferred units.
#[derive(Debug)]
pub struct Page {
    id: PageId,
    title: String,
    units: Vec<Arc<DeferredUnit>>,
    table_of_contents: bool,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: PageId::new(),
            title: title.into(),
            units: Vec::new(),
            table_of_contents: true,
        }
    }

    pub fn with_table_of_contents(mut self, enabled: bool) -> Self {
        self.table_of_contents = enabled;
        self
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn push(&mut self, unit: DeferredUnit) -> Result<Arc<DeferredUnit>, RenderError> {
        if self.units.iter().any(|existing| existing.id() == unit.id()) {
            return Err(RenderError::DuplicateSection(unit.id().clone()));
        }
        let anchor = unit.anchor();
        if let Some(existing) = self.units.iter().find(|existing| existing.anchor() == anchor) {
            return Err(RenderError::DuplicateAnchor {
                section: unit.id().clone(),
                existing: existing.id().clone(),
                anchor,
            });
        }
        let unit = Arc::new(unit);
        self.units.push(Arc::clone(&unit));
        Ok(unit)
    }

    pub fn units(&self) -> &[Arc<DeferredUnit>] {
        &self.units
    }

    pub fn unit(&self, id: &SectionId) -> Option<&Arc<DeferredUnit>> {
        self.units.iter().find(|unit| unit.id() == id)
    }

    pub fn expand(&self, id: &SectionId) -> Result<bool, RenderError> {
        self.unit(id)
            .map(|unit| unit.expand())
            .ok_or_else(|| RenderError::UnknownSection(id.clone()))
    }

    pub fn collapse(&self, id: &SectionId) -> Result<(), RenderError> {
        self.unit(id)
            .map(|unit| unit.collapse())
            .ok_or_else(|| RenderError::UnknownSection(id.clone()))
    }

    pub fn pending_ids(&self) -> Vec<SectionId> {
        self.units
            .iter()
            .filter(|unit| !unit.is_activated())
            .map(|unit| unit.id().clone())
            .collect()
    }

    pub fn activated_ids(&self) -> Vec<SectionId> {
        self.units
            .iter()
            .filter(|unit| unit.is_activated())
            .map(|unit| unit.id().clone())
            .collect()
    }

    pub fn all_activated(&self) -> bool {
        self.units.iter().all(|unit| unit.is_activated())
    }

    /// Unmounts every unit; returns how many were still pending.
    pub fn unmount(&self) -> usize {
        let pending = self.pending_ids().len();
        for unit in &self.units {
            unit.unmount();
        }
        info!(page = %self.id.0, sections = self.units.len(), pending, "page unmounted");
        pending
    }

    /// Anchor links stay valid whatever each section's phase.
    pub fn table_of_contents(&self) -> Option<Node> {
        if !self.table_of_contents || self.units.is_empty() {
            return None;
        }
        let items = self.units.iter().map(|unit| {
            Element::new("li")
                .child(
                    Element::new("a")
                        .attr("href", unit.anchor().href())
                        .text(unit.spec().label().to_string()),
                )
                .into()
        });
        Some(
            Element::new("nav")
                .attr("aria-label", "Table of contents")
                .child(Element::new("ol").children(items))
                .into(),
        )
    }

    /// `<main>` with heading, table of contents and every section.
    pub fn render(&self) -> Result<Node, RenderError> {
        let mut main = Element::new("main")
            .attr("data-page", self.id.0.clone())
            .child(Element::new("h1").text(self.title.clone()));
        if let Some(toc) = self.table_of_contents() {
            main = main.child(toc);
        }
        for unit in &self.units {
            main = main.child(unit.render()?);
        }
        Ok(main.into())
    }

    pub fn to_html(&self) -> Result<String, RenderError> {
        let main = self.render()?;
        Ok(format!(
            "{}{}</body></html>",
            self.document_open(),
            main.to_html()
        ))
    }

    fn document_open(&self) -> String {
        let title: Node = Element::new("title").text(self.title.clone()).into();
        format!(
            "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">{}</head><body>",
            title.to_html()
        )
    }

    fn shell_open(&self) -> String {
        let mut open = self.document_open();
        open.push_str(&format!("<main data-page=\"{}\">", self.id.0));
        open.push_str(&Node::from(Element::new("h1").text(self.title.clone())).to_html());
        if let Some(toc) = self.table_of_contents() {
            open.push_str(&toc.to_html());
        }
        open
    }

    /// Shell first, then one chunk per section after a cooperative yield,
    /// then the closing shell. Concatenated, the chunks equal `to_html`.
    /// A content error ends the stream.
    pub fn stream_html(&self) -> impl Stream<Item = Result<String, RenderError>> + Send + 'static {
        let open = self.shell_open();
        let units = self.units.clone();
        stream! {
            yield Ok(open);
            let mut failed = false;
            for unit in units {
                match streaming_yield(unit.as_ref()).await {
                    Ok(node) => yield Ok(node.to_html()),
                    Err(err) => {
                        failed = true;
                        yield Err(err);
                        break;
                    }
                }
            }
            if !failed {
                yield Ok(SHELL_CLOSE.to_string());
            }
        }
    }
}
