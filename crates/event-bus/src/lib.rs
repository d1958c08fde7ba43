use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use pagedefer_core_types::DeferError;

pub mod interaction;

pub use interaction::{interaction_bus, InteractionBus, InteractionEvent, InteractionKind};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), DeferError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus. One channel shared by every subscriber.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Fire-and-forget delivery. Returns how many subscribers saw the event;
    /// zero subscribers is not an error here.
    pub fn dispatch(&self, event: E) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E> std::fmt::Debug for InMemoryBus<E>
where
    E: Event,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), DeferError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| DeferError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_an_error_but_dispatch_is_not() {
        let bus = InMemoryBus::<u32>::new(4);
        assert!(bus.publish(1).await.is_err());
        assert_eq!(bus.dispatch(2), 0);
    }

    #[tokio::test]
    async fn dropping_a_receiver_unsubscribes() {
        let bus = InMemoryBus::<u32>::new(4);
        let rx = bus.subscribe();
        let mut other = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.dispatch(7), 1);
        assert_eq!(other.recv().await.unwrap(), 7);
    }
}
