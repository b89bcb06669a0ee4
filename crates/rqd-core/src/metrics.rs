//! Metrics seam. The core only records; exporting is another crate's job.
use std::{sync::Arc, time::Duration};

use rqd_model::{HostResources, RejectReason, TaskOutcome};

/// Backend receiving agent metrics. Every method defaults to a no-op.
pub trait MetricsBackend: Send + Sync + 'static {
    fn task_started(&self) {}

    fn task_finished(&self, _outcome: &TaskOutcome, _duration: Duration) {}

    fn admission_rejected(&self, _reason: &RejectReason) {}

    fn resources(&self, _snapshot: &HostResources) {}
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Discards everything.
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {}

impl NoopMetrics {
    pub fn handle() -> MetricsHandle {
        Arc::new(NoopMetrics)
    }
}
