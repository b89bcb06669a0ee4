use rqd_core::Subscribe;
use rqd_model::TaskEvent;

use crate::subscriber::view::log_event;

/// Writes every task transition to the log.
#[derive(Debug, Default)]
pub struct EventLogger;

impl EventLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for EventLogger {
    fn on_event(&self, event: &TaskEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "event-log"
    }
}
