use pagedefer_core_types::{AnchorId, DeferError, SectionId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Content generation failed. Passed through untouched.
    #[error("content generation failed: {0}")]
    Content(String),
    #[error("unknown section {0}")]
    UnknownSection(SectionId),
    #[error("duplicate section id {0}")]
    DuplicateSection(SectionId),
    /// Two distinct ids slugged to the same region root id.
    #[error("section {section} reuses anchor #{anchor} of section {existing}")]
    DuplicateAnchor {
        section: SectionId,
        existing: SectionId,
        anchor: AnchorId,
    },
}

impl RenderError {
    pub fn content(message: impl Into<String>) -> Self {
        Self::Content(message.into())
    }
}

impl From<RenderError> for DeferError {
    fn from(value: RenderError) -> Self {
        DeferError::new(value.to_string())
    }
}
