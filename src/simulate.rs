//! Mounts a page manifest against simulated host primitives.
//!
//! `render_page` is the crawler's view: the server-rendered document right
//! after mount, before any trigger has had a chance to fire. `simulate` plays
//! the manifest script against the same hosts and reports when each section
//! activated.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::StreamExt;
use pagedefer_activation::metrics::{self, ActivationMetricsSnapshot};
use pagedefer_activation::{
    ActivationCause, ElementId, HostCapabilities, IdleWindow, SectionId, SimulatedViewport,
};
use pagedefer_event_bus::{interaction_bus, InteractionBus};
use pagedefer_policy_center::PolicySnapshot;
use pagedefer_render::{Page, PageRuntime};
use serde::Serialize;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::errors::CliError;
use crate::manifest::{PageManifest, ScriptAction, ScriptStep};

const INTERACTION_BUS_CAPACITY: usize = 64;

/// Simulated host primitives shared by every section of one page.
#[derive(Clone, Debug)]
struct SimulatedHost {
    viewport: Arc<SimulatedViewport>,
    interactions: Arc<InteractionBus>,
    idle: Arc<IdleWindow>,
}

impl SimulatedHost {
    fn for_manifest(manifest: &PageManifest) -> Self {
        let viewport = SimulatedViewport::new(manifest.viewport.width, manifest.viewport.height);
        for (section, bounds) in manifest.sections.iter().zip(manifest.layout_boxes()) {
            let anchor = SectionId::new(section.id.clone()).anchor();
            viewport.mount_element(ElementId::from(&anchor), bounds);
        }
        Self {
            viewport,
            interactions: interaction_bus(INTERACTION_BUS_CAPACITY),
            idle: IdleWindow::new(),
        }
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::headless()
            .with_idle(self.idle.clone())
            .with_viewport(self.viewport.clone())
            .with_interactions(self.interactions.clone())
    }

    fn apply(&self, page: &Page, step: &ScriptStep) -> Result<(), CliError> {
        debug!(at_ms = step.at_ms, action = ?step.action, "script step");
        match &step.action {
            ScriptAction::ScrollTo { y } => self.viewport.scroll_to(*y),
            ScriptAction::ScrollBy { dy } => self.viewport.scroll_by(*dy),
            ScriptAction::Interact { event } => {
                let delivered = self.interactions.notify_dom_event(event);
                debug!(event = %event, delivered, "interaction delivered");
            }
            ScriptAction::Idle => self.idle.open(),
            ScriptAction::Expand { section } => {
                page.expand(&SectionId::from(section.as_str()))?;
            }
            ScriptAction::Collapse { section } => {
                page.collapse(&SectionId::from(section.as_str()))?;
            }
            ScriptAction::Resize { width, height } => self.viewport.resize(*width, *height),
        }
        Ok(())
    }
}

/// Section strategies as resolved for one page, in declaration order.
struct MountedPage {
    page: Arc<Page>,
    strategies: Vec<&'static str>,
}

fn mount_page(
    manifest: &PageManifest,
    snapshot: &PolicySnapshot,
    host: &SimulatedHost,
) -> Result<MountedPage, CliError> {
    let runtime =
        PageRuntime::from_policy(snapshot, host.capabilities(), manifest.viewport.width);
    let mut page = Page::new(manifest.title.clone())
        .with_table_of_contents(snapshot.features.table_of_contents);
    let mut strategies = Vec::with_capacity(manifest.sections.len());
    for section in &manifest.sections {
        let spec = section.to_spec();
        let strategy = runtime
            .plan(&spec)
            .kind()
            .map(|kind| kind.as_str())
            .unwrap_or("immediate");
        page.push(runtime.mount(spec, section.mode.into()))?;
        strategies.push(strategy);
    }
    info!(
        page = %page.id().0,
        sections = page.units().len(),
        constrained = runtime.is_constrained(),
        "page mounted"
    );
    Ok(MountedPage {
        page: Arc::new(page),
        strategies,
    })
}

/// Server-rendered HTML of the page: one chunk per flush when streaming
/// (shell, each section, closing shell), otherwise the whole document.
/// Streaming is ignored when the `streaming_shell` feature is off.
pub async fn render_page(
    manifest: &PageManifest,
    snapshot: &PolicySnapshot,
    stream: bool,
) -> Result<Vec<String>, CliError> {
    let host = SimulatedHost::for_manifest(manifest);
    let mounted = mount_page(manifest, snapshot, &host)?;
    let page = mounted.page;

    let chunks = if stream && snapshot.features.streaming_shell {
        let mut chunks = Vec::with_capacity(page.units().len() + 2);
        let mut html = Box::pin(page.stream_html());
        while let Some(chunk) = html.next().await {
            chunks.push(chunk?);
        }
        chunks
    } else {
        if stream {
            warn!("streaming shell disabled by policy; rendering whole document");
        }
        vec![page.to_html()?]
    };
    page.unmount();
    Ok(chunks)
}

#[derive(Clone, Debug, Serialize)]
pub struct SectionOutcome {
    pub id: String,
    pub mode: String,
    pub strategy: String,
    pub phase: String,
    pub cause: Option<ActivationCause>,
    /// Offset from mount at which the section activated.
    pub activated_at_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub title: String,
    pub policy_rev: u64,
    pub constrained: bool,
    pub elapsed_ms: u64,
    pub sections: Vec<SectionOutcome>,
    /// Sections still pending when the run ended.
    pub pending: Vec<String>,
    pub metrics: ActivationMetricsSnapshot,
}

impl SimulationReport {
    pub fn section(&self, id: &str) -> Option<&SectionOutcome> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn all_activated(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Plays the manifest script and waits until every section has activated or
/// `max_ms` has elapsed, then unmounts the page.
pub async fn simulate(
    manifest: &PageManifest,
    snapshot: &PolicySnapshot,
    max_ms: u64,
) -> Result<SimulationReport, CliError> {
    let started = Instant::now();
    let deadline = started + Duration::from_millis(max_ms);
    let host = SimulatedHost::for_manifest(manifest);
    let MountedPage { page, strategies } = mount_page(manifest, snapshot, &host)?;

    let player = {
        let page = Arc::clone(&page);
        let host = host.clone();
        let steps = manifest.ordered_script();
        tokio::spawn(async move {
            for step in steps {
                sleep_until(started + Duration::from_millis(step.at_ms)).await;
                if let Err(err) = host.apply(&page, &step) {
                    warn!(at_ms = step.at_ms, error = %err, "script step failed");
                }
            }
        })
    };

    let waiters = page.units().iter().map(|unit| {
        let controller = unit.controller().clone();
        async move {
            match timeout_at(deadline, controller.activated()).await {
                Ok(Ok(_)) => Some(elapsed_ms(started)),
                _ => None,
            }
        }
    });
    let activated_at = join_all(waiters).await;
    player.abort();

    let elapsed_ms = elapsed_ms(started);
    let sections: Vec<SectionOutcome> = page
        .units()
        .iter()
        .zip(strategies)
        .zip(activated_at)
        .map(|((unit, strategy), activated_at_ms)| {
            let phase = unit.phase();
            SectionOutcome {
                id: unit.id().as_str().to_string(),
                mode: unit.mode().as_str().to_string(),
                strategy: strategy.to_string(),
                phase: phase.as_str().to_string(),
                cause: phase.cause(),
                activated_at_ms: activated_at_ms.filter(|_| phase.is_activated()),
            }
        })
        .collect();
    let pending: Vec<String> = page
        .pending_ids()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    page.unmount();

    info!(
        elapsed_ms,
        activated = sections.len() - pending.len(),
        pending = pending.len(),
        "simulation finished"
    );
    Ok(SimulationReport {
        title: manifest.title.clone(),
        policy_rev: snapshot.rev,
        constrained: snapshot.viewport.is_constrained(manifest.viewport.width),
        elapsed_ms,
        sections,
        pending,
        metrics: metrics::snapshot(),
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
