//! Prometheus backend for the agent's metrics seam.
//!
//! [`PrometheusMetrics`] implements [`rqd_core::MetricsBackend`]. It owns its
//! [`Registry`]; the daemon serves [`PrometheusMetrics::render`] at
//! `GET /metrics`.
//!
//! ## Metrics
//! - `rqd_tasks_started_total` - Counter
//! - `rqd_tasks_finished_total{outcome}` - Counter
//! - `rqd_task_duration_seconds{outcome}` - Histogram
//! - `rqd_admission_rejected_total{reason}` - Counter
//! - `rqd_cores_available`, `rqd_cores_total` - Gauge
//! - `rqd_memory_available_mb`, `rqd_memory_total_mb` - Gauge
//! - `rqd_gpus_available` - Gauge
mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
