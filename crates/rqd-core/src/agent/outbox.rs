use std::{collections::VecDeque, sync::Mutex};

use rqd_model::TaskEvent;
use tokio::sync::Notify;

use crate::Subscribe;

/// FIFO of task events waiting for upstream delivery.
///
/// Events stay queued across disconnects. The head is removed only after
/// the coordinator accepted it, so delivery is at-least-once and per-task
/// order is preserved.
#[derive(Default)]
pub struct EventOutbox {
    queue: Mutex<VecDeque<TaskEvent>>,
    notify: Notify,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: TaskEvent) {
        self.queue
            .lock()
            .expect("event outbox lock poisoned")
            .push_back(event);
        self.notify.notify_one();
    }

    /// Oldest undelivered event, left in place.
    pub fn front(&self) -> Option<TaskEvent> {
        self.queue
            .lock()
            .expect("event outbox lock poisoned")
            .front()
            .cloned()
    }

    /// Drop the head if it is still the event with `seq`.
    pub fn pop(&self, seq: u64) -> Option<TaskEvent> {
        let mut queue = self.queue.lock().expect("event outbox lock poisoned");
        if queue.front().is_some_and(|e| e.seq == seq) {
            queue.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("event outbox lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves after the next `push`, or immediately if a push happened
    /// since the last wait.
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

impl Subscribe for EventOutbox {
    fn on_event(&self, event: &TaskEvent) {
        self.push(event.clone());
    }

    fn name(&self) -> &'static str {
        "outbox"
    }
}
