//! Batch event fan-out, built directly on
//! `tokio::sync::broadcast`. A slow subscriber never blocks publication:
//! once it falls behind the channel's ring buffer, its next `recv()`
//! returns `RecvError::Lagged(n)`, which `subscribe()`'s wrapper turns into
//! a synthesized `BatchEvent::BackpressureWarning` rather than propagating
//! the lag as an error.

use qcnorm_shared::BatchEvent;
use tokio::sync::broadcast;

pub struct EventBus {
    sender: broadcast::Sender<BatchEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes unconditionally; with no subscribers this is a no-op
    /// (`send` only errors when the receiver count is zero, which callers
    /// don't treat as a failure).
    pub fn publish(&self, event: BatchEvent) {
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<BatchEvent>,
}

impl EventSubscriber {
    /// Awaits the next event, transparently converting a `Lagged` overflow
    /// into a `BackpressureWarning` rather than an error. Returns `None`
    /// once the bus itself is dropped.
    pub async fn recv(&mut self) -> Option<BatchEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    tracing::warn!(dropped, "subscriber lagged behind event bus");
                    return Some(BatchEvent::BackpressureWarning {
                        topic: "batch_events".to_string(),
                        dropped,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
