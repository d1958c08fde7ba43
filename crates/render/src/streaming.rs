use std::future::IntoFuture;

use futures::future::BoxFuture;

use crate::content::{Content, RenderableContent};
use crate::errors::RenderError;
use crate::node::Node;

/// Renders its content after one cooperative yield, so a streaming consumer
/// can flush what came before. The output is exactly the direct render.
pub struct StreamingYield {
    content: RenderableContent,
}

impl StreamingYield {
    pub fn new(content: RenderableContent) -> Self {
        Self { content }
    }
}

impl IntoFuture for StreamingYield {
    type Output = Result<Node, RenderError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { streaming_yield(self.content.as_ref()).await })
    }
}

pub async fn streaming_yield(content: &dyn Content) -> Result<Node, RenderError> {
    tokio::task::yield_now().await;
    content.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{content_fn, ListContent};
    use futures::FutureExt;

    #[tokio::test]
    async fn output_matches_direct_render() {
        let content = ListContent::shared(["Mon 9-5", "Tue 9-5"]);
        let direct = content.render().unwrap();
        let streamed = StreamingYield::new(content.clone()).await.unwrap();
        assert_eq!(direct, streamed);
    }

    #[tokio::test]
    async fn suspends_exactly_once_before_rendering() {
        let content = ListContent::shared(["a"]);
        let mut pending = StreamingYield::new(content).into_future();
        assert!((&mut pending).now_or_never().is_none());
        assert!(pending.await.is_ok());
    }

    #[tokio::test]
    async fn errors_propagate_unchanged() {
        let content = content_fn(|| Err(RenderError::content("reviews backend down")));
        assert_eq!(
            StreamingYield::new(content).await,
            Err(RenderError::Content("reviews backend down".into()))
        );
    }
}
