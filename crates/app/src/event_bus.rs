//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use hublink_domain::error::HubError;
use hublink_domain::event::Event;

use crate::ports::EventPublisher;

/// Fan-out of hub events to every task that subscribed.
///
/// Publishing never fails: with no subscriber the event is dropped, and a
/// subscriber that lags behind `capacity` events loses the oldest ones.
pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), HubError>> + Send {
        if self.sender.send(event).is_err() {
            tracing::trace!("event dropped, no subscriber");
        }
        async { Ok(()) }
    }
}
