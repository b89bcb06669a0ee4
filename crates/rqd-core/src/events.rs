//! Task event fan-out.
use std::sync::{Arc, Mutex};

use rqd_model::{TaskEvent, TaskInfo};

/// Receiver of task state transitions.
///
/// `on_event` runs synchronously on the publishing task and must not block:
/// queue the event and return.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &TaskEvent);

    fn name(&self) -> &'static str;
}

/// Stamps every transition with a sequence number and hands it to each
/// subscriber in registration order.
///
/// Numbering and delivery happen under one lock, so every subscriber sees
/// events in `seq` order.
pub struct EventBus {
    seq: Mutex<u64>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EventBus {
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            seq: Mutex::new(0),
            subscribers,
        }
    }

    /// Bus without subscribers.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn publish(&self, info: &TaskInfo) -> TaskEvent {
        let mut seq = self.seq.lock().expect("event bus lock poisoned");
        *seq += 1;
        let event = TaskEvent::from_info(*seq, info);
        for sub in &self.subscribers {
            sub.on_event(&event);
        }
        event
    }

    pub fn subscriber_names(&self) -> Vec<&'static str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }
}
