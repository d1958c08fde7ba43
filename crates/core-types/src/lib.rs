use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the pagedefer crates.
#[derive(Debug, Error, Clone)]
pub enum DeferError {
    #[error("{message}")]
    Message { message: String },
}

impl DeferError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Anchor of the region root. Independent of activation phase.
    pub fn anchor(&self) -> AnchorId {
        AnchorId::from_section(self)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// In-page navigation target for a section (`#anchor`).
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AnchorId(pub String);

impl AnchorId {
    pub fn from_section(section: &SectionId) -> Self {
        let slug: String = section
            .0
            .trim()
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '-'
                }
            })
            .collect();
        if slug.is_empty() {
            Self("section".to_string())
        } else {
            Self(slug)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derived id for a child element of the region (`{anchor}-{suffix}`).
    pub fn child(&self, suffix: &str) -> String {
        format!("{}-{}", self.0, suffix)
    }

    pub fn href(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host-side identity of a mounted element (the region root uses its anchor).
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ElementId(pub String);

impl From<&AnchorId> for ElementId {
    fn from(anchor: &AnchorId) -> Self {
        Self(anchor.0.clone())
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageId(pub String);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Declared priority class of a section.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl FromStr for Priority {
    type Err = DeferError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(DeferError::new(format!("unknown priority '{other}'"))),
        }
    }
}

/// Trigger strategy selected for a section.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TriggerKind {
    Idle,
    Interaction,
    #[cfg_attr(feature = "serde-full", serde(alias = "viewport"))]
    Proximity,
    #[cfg_attr(feature = "serde-full", serde(alias = "toggle"))]
    Manual,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 4] = [
        TriggerKind::Idle,
        TriggerKind::Interaction,
        TriggerKind::Proximity,
        TriggerKind::Manual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Idle => "idle",
            TriggerKind::Interaction => "interaction",
            TriggerKind::Proximity => "proximity",
            TriggerKind::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = DeferError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(TriggerKind::Idle),
            "interaction" => Ok(TriggerKind::Interaction),
            "proximity" | "viewport" => Ok(TriggerKind::Proximity),
            "manual" | "toggle" => Ok(TriggerKind::Manual),
            other => Err(DeferError::new(format!("unknown trigger strategy '{other}'"))),
        }
    }
}
