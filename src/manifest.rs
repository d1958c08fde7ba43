//! Page manifests: the section declarations of one page plus an optional
//! script of host events for `simulate`. YAML or JSON.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use pagedefer_activation::{ElementBox, TriggerConfig};
use pagedefer_core_types::{Priority, SectionId};
use pagedefer_event_bus::InteractionKind;
use pagedefer_render::{ListContent, SectionSpec, TextContent, UnitMode};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::CliError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageManifest {
    pub title: String,
    #[serde(default)]
    pub viewport: ViewportSpec,
    #[serde(default)]
    pub layout: LayoutSpec,
    #[serde(default)]
    pub sections: Vec<SectionManifest>,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ViewportSpec {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSpec {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Vertical stacking of sections in the simulated document.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpec {
    /// Top of the first section.
    pub top_px: i64,
    pub gap_px: i64,
    pub section_height_px: i64,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self {
            top_px: 0,
            gap_px: 40,
            section_height_px: 600,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestMode {
    Lazy,
    #[default]
    Seo,
    Collapsible,
}

impl From<ManifestMode> for UnitMode {
    fn from(value: ManifestMode) -> Self {
        match value {
            ManifestMode::Lazy => UnitMode::Lazy,
            ManifestMode::Seo => UnitMode::Seo,
            ManifestMode::Collapsible => UnitMode::Collapsible,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentManifest {
    Text(String),
    Items { items: Vec<String> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionManifest {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub content: ContentManifest,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub default_expanded: bool,
    #[serde(default)]
    pub mode: ManifestMode,
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Absolute document offset; otherwise stacked after the previous section.
    #[serde(default)]
    pub top_px: Option<i64>,
    #[serde(default)]
    pub height_px: Option<i64>,
}

impl SectionManifest {
    pub fn to_spec(&self) -> SectionSpec {
        let content = match &self.content {
            ContentManifest::Text(text) => TextContent::shared(text.clone()),
            ContentManifest::Items { items } => ListContent::shared(items.clone()),
        };
        let mut spec = SectionSpec::new(self.id.clone(), content)
            .priority(self.priority)
            .default_expanded(self.default_expanded)
            .trigger(self.trigger.clone());
        if let Some(title) = &self.title {
            spec = spec.title(title.clone());
        }
        if let Some(summary) = &self.summary {
            spec = spec.summary(TextContent::shared(summary.clone()));
        }
        spec
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Offset from mount, in milliseconds.
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    ScrollTo { y: i64 },
    ScrollBy { dy: i64 },
    /// A DOM event name such as `pointerdown` or `scroll`.
    Interact { event: String },
    /// The host's idle window opens.
    Idle,
    Expand { section: String },
    Collapse { section: String },
    Resize { width: u32, height: u32 },
}

impl PageManifest {
    pub async fn load(path: &Path) -> Result<Self, CliError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| CliError::ManifestRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&raw, path)
    }

    /// Parses YAML (JSON is accepted as YAML) and validates the result.
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, CliError> {
        let manifest: PageManifest =
            serde_yaml::from_str(raw).map_err(|err| CliError::invalid(origin, err.to_string()))?;
        manifest.validate(origin)?;
        Ok(manifest)
    }

    fn validate(&self, origin: &Path) -> Result<(), CliError> {
        let mut seen = HashSet::new();
        let mut anchors = HashMap::new();
        for section in &self.sections {
            if section.id.trim().is_empty() {
                return Err(CliError::invalid(origin, "section id must not be empty"));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(CliError::invalid(
                    origin,
                    format!("duplicate section id '{}'", section.id),
                ));
            }
            let anchor = SectionId::new(section.id.clone()).anchor();
            if let Some(existing) = anchors.insert(anchor.clone(), section.id.as_str()) {
                return Err(CliError::invalid(
                    origin,
                    format!(
                        "sections '{existing}' and '{}' share anchor #{anchor}",
                        section.id
                    ),
                ));
            }
        }
        for step in &self.script {
            match &step.action {
                ScriptAction::Expand { section } | ScriptAction::Collapse { section }
                    if !seen.contains(section.as_str()) =>
                {
                    return Err(CliError::invalid(
                        origin,
                        format!("script step at {}ms names unknown section '{section}'", step.at_ms),
                    ));
                }
                ScriptAction::Interact { event } if InteractionKind::from_dom_event(event).is_none() => {
                    return Err(CliError::invalid(
                        origin,
                        format!("script step at {}ms uses unsupported event '{event}'", step.at_ms),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Document boxes of every section root, in declaration order.
    pub fn layout_boxes(&self) -> Vec<ElementBox> {
        let mut cursor = self.layout.top_px;
        self.sections
            .iter()
            .map(|section| {
                let top = section.top_px.unwrap_or(cursor);
                let height = section.height_px.unwrap_or(self.layout.section_height_px);
                cursor = top.saturating_add(height).saturating_add(self.layout.gap_px);
                ElementBox::new(top, height)
            })
            .collect()
    }

    /// Script steps ordered by offset; ties keep declaration order.
    pub fn ordered_script(&self) -> Vec<ScriptStep> {
        let mut steps = self.script.clone();
        steps.sort_by_key(|step| step.at_ms);
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagedefer_core_types::TriggerKind;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
title: Cafe Uno
viewport: { width: 375, height: 700 }
layout: { top_px: 900 }
sections:
  - id: hours
    title: Opening hours
    summary: Open today until 4pm
    content: { items: ["Mon 8-4", "Tue 8-4"] }
    priority: high
  - id: reviews
    mode: collapsible
    content: Great coffee.
    priority: low
    trigger: { root_margin_px: 1000, fallback_ms: 4000 }
    height_px: 300
script:
  - { at_ms: 900, action: expand, section: reviews }
  - { at_ms: 100, action: scroll_to, y: 400 }
  - { at_ms: 500, action: idle }
"#;

    fn origin() -> PathBuf {
        PathBuf::from("page.yaml")
    }

    #[test]
    fn parses_sections_and_script() {
        let manifest = PageManifest::parse(SAMPLE, &origin()).unwrap();
        assert_eq!(manifest.viewport.width, 375);
        assert_eq!(manifest.sections.len(), 2);
        assert_eq!(manifest.sections[0].priority, Priority::High);
        assert_eq!(manifest.sections[1].mode, ManifestMode::Collapsible);
        assert_eq!(manifest.sections[1].trigger.fallback_ms, Some(4_000));

        let script = manifest.ordered_script();
        assert_eq!(script[0].action, ScriptAction::ScrollTo { y: 400 });
        assert_eq!(script[1].action, ScriptAction::Idle);
        assert_eq!(
            script[2].action,
            ScriptAction::Expand {
                section: "reviews".into()
            }
        );
    }

    #[test]
    fn stacks_sections_below_layout_top() {
        let manifest = PageManifest::parse(SAMPLE, &origin()).unwrap();
        let boxes = manifest.layout_boxes();
        assert_eq!(boxes[0], ElementBox::new(900, 600));
        assert_eq!(boxes[1], ElementBox::new(1_540, 300));
    }

    #[test]
    fn rejects_unknown_script_targets() {
        let raw = "title: t\nsections: []\nscript:\n  - { at_ms: 1, action: expand, section: nope }\n";
        let err = PageManifest::parse(raw, &origin()).unwrap_err();
        assert!(err.to_string().contains("unknown section 'nope'"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = "title: t\nsections:\n  - { id: a, content: x }\n  - { id: a, content: y }\n";
        assert!(PageManifest::parse(raw, &origin()).is_err());
    }

    #[test]
    fn rejects_ids_that_share_an_anchor() {
        let raw = "title: t\nsections:\n  - { id: menu prices, content: x }\n  - { id: menu&prices, content: y }\n";
        let err = PageManifest::parse(raw, &origin()).unwrap_err();
        assert!(err.to_string().contains("share anchor #menu-prices"));
    }

    #[test]
    fn huge_offsets_saturate_instead_of_overflowing() {
        let raw = format!(
            "title: t\nlayout: {{ top_px: {} }}\nsections:\n  - {{ id: a, content: x }}\n  - {{ id: b, content: y }}\n",
            i64::MAX - 10
        );
        let manifest = PageManifest::parse(&raw, &origin()).unwrap();
        let boxes = manifest.layout_boxes();
        assert_eq!(boxes[0], ElementBox::new(i64::MAX - 10, 600));
        assert_eq!(boxes[1], ElementBox::new(i64::MAX, 600));
    }

    #[test]
    fn strategy_aliases_load_from_manifests() {
        let raw = "title: t\nsections:\n  - { id: a, content: x, trigger: { strategy: toggle } }\n  - { id: b, content: y, trigger: { strategy: viewport } }\n";
        let manifest = PageManifest::parse(raw, &origin()).unwrap();
        assert_eq!(manifest.sections[0].trigger.strategy, Some(TriggerKind::Manual));
        assert_eq!(manifest.sections[1].trigger.strategy, Some(TriggerKind::Proximity));
    }
}
