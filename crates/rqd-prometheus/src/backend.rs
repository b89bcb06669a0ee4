use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use rqd_core::MetricsBackend;
use rqd_model::{HostResources, RejectReason, TaskOutcome};

/// Render frames run from seconds to many hours.
const DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0, 43200.0,
];

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    started: IntCounter,
    finished: IntCounterVec,
    duration: HistogramVec,
    rejected: IntCounterVec,
    cores_available: IntGauge,
    cores_total: IntGauge,
    memory_available: IntGauge,
    memory_total: IntGauge,
    gpus_available: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register every metric in `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let started = IntCounter::new("rqd_tasks_started_total", "Task processes started")?;
        let finished = IntCounterVec::new(
            Opts::new("rqd_tasks_finished_total", "Tasks that reached a terminal state"),
            &["outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("rqd_task_duration_seconds", "Task process run time")
                .buckets(DURATION_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        let rejected = IntCounterVec::new(
            Opts::new("rqd_admission_rejected_total", "Rejected assignments"),
            &["reason"],
        )?;
        let cores_available = IntGauge::new("rqd_cores_available", "Unreserved cores")?;
        let cores_total = IntGauge::new("rqd_cores_total", "Cores offered by this host")?;
        let memory_available =
            IntGauge::new("rqd_memory_available_mb", "Unreserved memory in MB")?;
        let memory_total = IntGauge::new("rqd_memory_total_mb", "Memory offered by this host in MB")?;
        let gpus_available = IntGauge::new("rqd_gpus_available", "Unreserved GPU units")?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(finished.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(cores_available.clone()))?;
        registry.register(Box::new(cores_total.clone()))?;
        registry.register(Box::new(memory_available.clone()))?;
        registry.register(Box::new(memory_total.clone()))?;
        registry.register(Box::new(gpus_available.clone()))?;

        Ok(Self {
            registry,
            started,
            finished,
            duration,
            rejected,
            cores_available,
            cores_total,
            memory_available,
            memory_total,
            gpus_available,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, with its content type.
    pub fn render(&self) -> Result<(String, Vec<u8>), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        Ok((encoder.format_type().to_string(), buf))
    }

    fn histogram(&self, outcome: &TaskOutcome) -> Histogram {
        self.duration.with_label_values(&[outcome.as_label()])
    }
}

fn gauge_value<T: TryInto<i64>>(v: T) -> i64 {
    v.try_into().unwrap_or(i64::MAX)
}

impl MetricsBackend for PrometheusMetrics {
    fn task_started(&self) {
        self.started.inc();
    }

    fn task_finished(&self, outcome: &TaskOutcome, duration: Duration) {
        self.finished.with_label_values(&[outcome.as_label()]).inc();
        self.histogram(outcome).observe(duration.as_secs_f64());
    }

    fn admission_rejected(&self, reason: &RejectReason) {
        self.rejected.with_label_values(&[reason.as_label()]).inc();
    }

    fn resources(&self, snapshot: &HostResources) {
        self.cores_available.set(i64::from(snapshot.available.cores));
        self.cores_total.set(i64::from(snapshot.total.cores));
        self.memory_available
            .set(gauge_value(snapshot.available.memory_mb));
        self.memory_total.set(gauge_value(snapshot.total.memory_mb));
        self.gpus_available
            .set(i64::from(snapshot.available.gpu_units));
    }
}
