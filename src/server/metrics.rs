//! Prometheus metrics for the status reconciler
//!
//! Each `ControllerMetrics` owns its own registry, so tests can create as many
//! as they like without colliding on metric names.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub type SharedMetrics = Arc<ControllerMetrics>;

pub struct ControllerMetrics {
    registry: Registry,
    reconciliations_total: IntCounterVec,
    reconciliation_duration_seconds: HistogramVec,
    status_updates_total: IntCounter,
    rollouts_completed_total: IntCounter,
    rollout_checks_skipped_total: IntCounterVec,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations_total = IntCounterVec::new(
            Opts::new(
                "hcpstatus_reconciliations_total",
                "Total number of HostedControlPlane reconciliations",
            ),
            &["result"],
        )?;
        let reconciliation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "hcpstatus_reconciliation_duration_seconds",
                "Duration of HostedControlPlane reconciliations in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 30.0, 120.0]),
            &["result"],
        )?;
        let status_updates_total = IntCounter::new(
            "hcpstatus_status_updates_total",
            "Total number of HostedControlPlane status writes",
        )?;
        let rollouts_completed_total = IntCounter::new(
            "hcpstatus_rollouts_completed_total",
            "Total number of release rollouts recorded as complete",
        )?;
        let rollout_checks_skipped_total = IntCounterVec::new(
            Opts::new(
                "hcpstatus_rollout_checks_skipped_total",
                "Rollout checks skipped because ClusterVersion history was unavailable",
            ),
            &["reason"],
        )?;

        registry.register(Box::new(reconciliations_total.clone()))?;
        registry.register(Box::new(reconciliation_duration_seconds.clone()))?;
        registry.register(Box::new(status_updates_total.clone()))?;
        registry.register(Box::new(rollouts_completed_total.clone()))?;
        registry.register(Box::new(rollout_checks_skipped_total.clone()))?;

        Ok(Self {
            registry,
            reconciliations_total,
            reconciliation_duration_seconds,
            status_updates_total,
            rollouts_completed_total,
            rollout_checks_skipped_total,
        })
    }

    pub fn record_reconciliation_success(&self, duration_secs: f64) {
        self.reconciliations_total
            .with_label_values(&["success"])
            .inc();
        self.reconciliation_duration_seconds
            .with_label_values(&["success"])
            .observe(duration_secs);
    }

    /// Record a failed reconcile; `duration_secs` is 0 when unknown
    pub fn record_reconciliation_error(&self, duration_secs: f64) {
        self.reconciliations_total.with_label_values(&["error"]).inc();
        self.reconciliation_duration_seconds
            .with_label_values(&["error"])
            .observe(duration_secs);
    }

    pub fn record_status_update(&self) {
        self.status_updates_total.inc();
    }

    pub fn record_rollout_completed(&self) {
        self.rollouts_completed_total.inc();
    }

    /// `reason` is `timeout` or `fetch_error`
    pub fn record_rollout_check_skipped(&self, reason: &str) {
        self.rollout_checks_skipped_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Render every metric in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Create a metrics registry for the controller
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(ControllerMetrics::new()?))
}
