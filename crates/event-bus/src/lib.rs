use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::warn;

use binder_types::{EventPattern, PushEvent, SharedError};

/// Payload types carried on the bus. The name is what subscription patterns match.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {
    fn name(&self) -> &str;
}

impl Event for PushEvent {
    fn name(&self) -> &str {
        &self.event
    }
}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), SharedError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Simple in-memory bus suitable for tests and in-process binders.
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

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), SharedError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| SharedError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Materialise an mpsc receiver carrying only the events whose name matches
/// `pattern`, so callers can await events without handling broadcast lag.
/// Lagged events are dropped with a warning; the stream ends when the bus is
/// dropped or the receiver is closed.
pub fn subscribe_matching<E>(
    bus: &InMemoryBus<E>,
    pattern: EventPattern,
    capacity: usize,
) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if !pattern.matches(ev.name()) {
                        continue;
                    }
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "binder-event-bus", skipped, %pattern, "subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    out_rx
}
