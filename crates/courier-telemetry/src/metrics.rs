//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Collector registration stays private; callers record through named
//!   methods so label sets cannot drift.
//! - Each `Metrics` owns its registry, so tests and embedded engines never
//!   collide on the process-global default registry.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Outcome label recorded for a task that panicked.
pub const OUTCOME_PANICKED: &str = "panicked";

/// Prometheus-backed metrics shared by the engine's components.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

struct MetricsInner {
    registry: Registry,
    tasks_total: IntCounterVec,
    stages_total: IntCounterVec,
    queue_depth: IntGauge,
    tasks_in_flight: IntGauge,
    bytes_copied_total: IntCounter,
}

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Events waiting in the intake queue.
    pub queue_depth: i64,
    /// Tasks currently running.
    pub tasks_in_flight: i64,
    /// Tasks that finished without errors.
    pub tasks_completed: u64,
    /// Tasks that finished with an error.
    pub tasks_failed: u64,
    /// Tasks stopped by their deadline.
    pub tasks_timed_out: u64,
    /// Tasks that panicked.
    pub tasks_panicked: u64,
    /// Bytes written to backups and destinations.
    pub bytes_copied_total: u64,
}

impl Metrics {
    /// Construct a registry with the engine collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let tasks_total = IntCounterVec::new(
            Opts::new(
                "distribution_tasks_total",
                "Distribution tasks finished by outcome",
            ),
            &["outcome"],
        )
        .map_err(|source| collector("distribution_tasks_total", source))?;
        let stages_total = IntCounterVec::new(
            Opts::new(
                "distribution_stages_total",
                "Pipeline stages executed by status",
            ),
            &["stage", "status"],
        )
        .map_err(|source| collector("distribution_stages_total", source))?;
        let queue_depth = IntGauge::with_opts(Opts::new(
            "distribution_queue_depth",
            "File events waiting in the intake queue",
        ))
        .map_err(|source| collector("distribution_queue_depth", source))?;
        let tasks_in_flight = IntGauge::with_opts(Opts::new(
            "distribution_tasks_in_flight",
            "Distribution tasks currently running",
        ))
        .map_err(|source| collector("distribution_tasks_in_flight", source))?;
        let bytes_copied_total = IntCounter::with_opts(Opts::new(
            "distribution_bytes_copied_total",
            "Bytes written to backups and destinations",
        ))
        .map_err(|source| collector("distribution_bytes_copied_total", source))?;

        register(&registry, "distribution_tasks_total", &tasks_total)?;
        register(&registry, "distribution_stages_total", &stages_total)?;
        register(&registry, "distribution_queue_depth", &queue_depth)?;
        register(&registry, "distribution_tasks_in_flight", &tasks_in_flight)?;
        register(
            &registry,
            "distribution_bytes_copied_total",
            &bytes_copied_total,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                tasks_total,
                stages_total,
                queue_depth,
                tasks_in_flight,
                bytes_copied_total,
            }),
        })
    }

    /// Count a finished task under `outcome`.
    pub fn record_task(&self, outcome: &str) {
        self.inner
            .tasks_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count one pipeline stage.
    pub fn record_stage(&self, stage: &str, status: &str) {
        self.inner
            .stages_total
            .with_label_values(&[stage, status])
            .inc();
    }

    /// Set the intake queue depth gauge.
    pub fn set_queue_depth(&self, depth: i64) {
        self.inner.queue_depth.set(depth);
    }

    /// Track a task entering execution.
    pub fn task_started(&self) {
        self.inner.tasks_in_flight.inc();
    }

    /// Track a task leaving execution.
    pub fn task_finished(&self) {
        self.inner.tasks_in_flight.dec();
    }

    /// Add transferred bytes.
    pub fn add_bytes_copied(&self, bytes: u64) {
        self.inner.bytes_copied_total.inc_by(bytes);
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or yields invalid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a snapshot of the engine counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let tasks = |outcome: &str| self.inner.tasks_total.with_label_values(&[outcome]).get();
        MetricsSnapshot {
            queue_depth: self.inner.queue_depth.get(),
            tasks_in_flight: self.inner.tasks_in_flight.get(),
            tasks_completed: tasks("completed"),
            tasks_failed: tasks("failed"),
            tasks_timed_out: tasks("timed_out"),
            tasks_panicked: tasks(OUTCOME_PANICKED),
            bytes_copied_total: self.inner.bytes_copied_total.get(),
        }
    }
}

fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
