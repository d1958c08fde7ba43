use std::fmt;
use std::sync::Arc;

use crate::errors::RenderError;
use crate::node::{Element, Node};

/// Opaque content owned by the caller. Rendering may fail; the failure is
/// handed back unchanged.
pub trait Content: Send + Sync {
    fn render(&self) -> Result<Node, RenderError>;
}

pub type RenderableContent = Arc<dyn Content>;

/// Plain paragraphs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextContent {
    paragraphs: Vec<String>,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let paragraphs = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self { paragraphs }
    }

    pub fn shared(text: impl Into<String>) -> RenderableContent {
        Arc::new(Self::new(text))
    }
}

impl Content for TextContent {
    fn render(&self) -> Result<Node, RenderError> {
        Ok(Node::Fragment(
            self.paragraphs
                .iter()
                .map(|p| Element::new("p").text(p.clone()).into())
                .collect(),
        ))
    }
}

/// Bulleted list, e.g. opening hours or review snippets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListContent {
    items: Vec<String>,
}

impl ListContent {
    pub fn new(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shared(items: impl IntoIterator<Item = impl Into<String>>) -> RenderableContent {
        Arc::new(Self::new(items))
    }
}

impl Content for ListContent {
    fn render(&self) -> Result<Node, RenderError> {
        Ok(Element::new("ul")
            .children(
                self.items
                    .iter()
                    .map(|item| Element::new("li").text(item.clone()).into()),
            )
            .into())
    }
}

pub struct FnContent<F> {
    render: F,
}

impl<F> Content for FnContent<F>
where
    F: Fn() -> Result<Node, RenderError> + Send + Sync,
{
    fn render(&self) -> Result<Node, RenderError> {
        (self.render)()
    }
}

impl<F> fmt::Debug for FnContent<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnContent")
    }
}

/// Wraps a closure as shared content.
pub fn content_fn<F>(render: F) -> RenderableContent
where
    F: Fn() -> Result<Node, RenderError> + Send + Sync + 'static,
{
    Arc::new(FnContent { render })
}
