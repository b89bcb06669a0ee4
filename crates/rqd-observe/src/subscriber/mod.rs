mod event_log;
mod view;

pub use event_log::EventLogger;
pub use view::{log_event, message_for};
