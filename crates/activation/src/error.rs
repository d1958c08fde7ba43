use pagedefer_core_types::{DeferError, ElementId, SectionId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("section {0} was unmounted before activation")]
    Unmounted(SectionId),
}

/// Returned by an intersection host that cannot watch an element.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserveError {
    #[error("element {0} is not mounted")]
    NotMounted(ElementId),
}

impl From<ActivationError> for DeferError {
    fn from(value: ActivationError) -> Self {
        DeferError::new(value.to_string())
    }
}

impl From<ObserveError> for DeferError {
    fn from(value: ObserveError) -> Self {
        DeferError::new(value.to_string())
    }
}
