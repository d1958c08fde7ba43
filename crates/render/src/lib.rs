//! Render layer for deferred sections.
//!
//! A [`DeferredUnit`] reads its controller's phase and decides whether the
//! summary, the content, or both (one of them visually hidden) are mounted.
//! [`Page`] assembles units behind a table of contents and can stream its
//! HTML, yielding before each section.

pub mod content;
pub mod errors;
pub mod node;
pub mod page;
pub mod section;
pub mod streaming;
pub mod unit;

pub use content::{content_fn, Content, ListContent, RenderableContent, TextContent};
pub use errors::RenderError;
pub use node::{Element, Node, VISUALLY_HIDDEN};
pub use page::{Page, PageRuntime};
pub use section::{ExpandState, SectionSpec};
pub use streaming::{streaming_yield, StreamingYield};
pub use unit::{DeferredUnit, UnitMode};
