use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::constants::EVENT_QUEUE_CAPACITY;
use crate::errors::ClientError;

/// Notification emitted by the [`crate::Client`] during its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The bulk fetch finished. Carries a copy of the whole flag cache.
    Initialized(HashMap<String, bool>),
    /// A live update was applied to the flag cache.
    FlagUpdated {
        /// Name of the updated feature flag.
        name: String,
        /// The new state of the feature flag.
        state: bool,
    },
    /// The live update channel was closed.
    Disconnected,
    /// The live update channel reported a failure.
    Error(ClientError),
}

pub(crate) type Observer = Box<dyn Fn(&Event) + Send + Sync>;

pub(crate) struct EventEmitter {
    sender: broadcast::Sender<Event>,
    observers: Vec<Observer>,
}

impl EventEmitter {
    pub fn new(observers: Vec<Observer>) -> Self {
        let (sender, _) = broadcast::channel(EVENT_QUEUE_CAPACITY);
        Self { sender, observers }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        for observer in &self.observers {
            observer(&event);
        }
        // No subscribers is not an error.
        _ = self.sender.send(event);
    }
}
