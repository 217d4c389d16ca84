//! Many-producer, single-consumer event channel.
//!
//! Publishing never blocks and works from any thread, including threads
//! outside the async runtime. The queue is unbounded: a flood of producer
//! events grows memory without limit.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use banter_core::error::BanterError;
use banter_core::events::{TriggerEvent, TriggerKind};

/// Create a connected publisher/consumer pair.
pub fn event_channel() -> (EventPublisher, EventConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventPublisher { tx }, EventConsumer { rx })
}

/// Producer side. Cheap to clone and `Send`, so each callback thread can
/// own one.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: UnboundedSender<TriggerEvent>,
}

impl EventPublisher {
    /// Enqueue `event` at the tail.
    ///
    /// Only fails once the consumer has been dropped.
    pub fn publish(&self, event: TriggerEvent) -> Result<(), BanterError> {
        let kind = event.kind();
        self.tx
            .send(event)
            .map_err(|_| BanterError::Dispatch(format!("Event channel closed, dropped {}", kind)))?;
        debug!(event = %kind, "Event published");
        Ok(())
    }

    /// Publish a payload-free event, logging instead of failing.
    pub fn publish_kind(&self, kind: TriggerKind) {
        if let Err(e) = self.publish(TriggerEvent::new(kind)) {
            warn!(error = %e, "Failed to publish event");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side. Not cloneable; whoever owns it is the single consumer.
#[derive(Debug)]
pub struct EventConsumer {
    rx: UnboundedReceiver<TriggerEvent>,
}

impl EventConsumer {
    /// Wait for the oldest undelivered event.
    ///
    /// Returns `None` only when every publisher has been dropped and the
    /// queue is empty.
    pub async fn consume(&mut self) -> Option<TriggerEvent> {
        self.rx.recv().await
    }

    /// Take the oldest event if one is already queued.
    pub fn try_consume(&mut self) -> Option<TriggerEvent> {
        self.rx.try_recv().ok()
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
