//! HostedControlPlane status reconciliation
//!
//! One pass reads the control plane, mirrors the ClusterVersion conditions onto
//! it, records a finished release rollout and writes the status back if
//! anything changed. Steps compute a new status value; only this module
//! persists, at most once per pass.

use crate::controller::clock::Clock;
use crate::controller::conditions::{derive_cluster_version_conditions, with_conditions};
use crate::controller::release::{LookupError, ReleaseProvider};
use crate::controller::rollout::{
    resolve_desired_release, track_rollout, HistoryUnavailable, RolloutCheck,
    HISTORY_FETCH_TIMEOUT, RELEASE_LOOKUP_TIMEOUT,
};
use crate::controller::store::{
    ClusterVersionSource, ControlPlaneRef, ControlPlaneStore, StoreError,
};
use crate::crd::HostedControlPlane;
use crate::server::SharedMetrics;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Requeue delay after a failed reconcile
pub const ERROR_REQUEUE_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to get HostedControlPlane: {0}")]
    FetchControlPlane(#[source] StoreError),

    #[error("failed to resolve release image: {0}")]
    Lookup(#[from] LookupError),

    #[error("HostedControlPlane status was modified concurrently: {0}")]
    Conflict(#[source] StoreError),

    #[error("failed to update HostedControlPlane status: {0}")]
    PersistStatus(#[source] StoreError),

    #[error("HostedControlPlane missing namespace")]
    MissingNamespace,
}

/// What a reconcile pass did to the stored status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Computed status equals the stored one; nothing written
    Unchanged,
    /// Status written
    Updated,
}

pub struct Context {
    pub control_planes: Arc<dyn ControlPlaneStore>,
    pub cluster_versions: Arc<dyn ClusterVersionSource>,
    pub release_provider: Arc<dyn ReleaseProvider>,
    pub clock: Arc<dyn Clock>,
    /// Optional controller metrics for Prometheus
    pub metrics: Option<SharedMetrics>,
    pub history_fetch_timeout: Duration,
    pub release_lookup_timeout: Duration,
}

impl Context {
    pub fn new(
        control_planes: Arc<dyn ControlPlaneStore>,
        cluster_versions: Arc<dyn ClusterVersionSource>,
        release_provider: Arc<dyn ReleaseProvider>,
        clock: Arc<dyn Clock>,
        metrics: Option<SharedMetrics>,
    ) -> Self {
        Context {
            control_planes,
            cluster_versions,
            release_provider,
            clock,
            metrics,
            history_fetch_timeout: HISTORY_FETCH_TIMEOUT,
            release_lookup_timeout: RELEASE_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, history_fetch: Duration, release_lookup: Duration) -> Self {
        self.history_fetch_timeout = history_fetch;
        self.release_lookup_timeout = release_lookup;
        self
    }
}

/// Bring the status of one HostedControlPlane in line with its hosted cluster
///
/// 1. Fetch the control plane (fatal on error)
/// 2. Fetch ClusterVersion and derive the mirrored conditions; a fetch error
///    becomes `Unknown` conditions rather than a failure
/// 3. If `status.releaseImage != spec.releaseImage`, resolve the desired
///    release and check whether the hosted cluster finished rolling it out
/// 4. Write the status if it differs from what was fetched
pub async fn reconcile_control_plane(
    key: &ControlPlaneRef,
    ctx: &Context,
) -> Result<ReconcileOutcome, ReconcileError> {
    let control_plane = ctx
        .control_planes
        .get(key)
        .await
        .map_err(ReconcileError::FetchControlPlane)?;

    let original = control_plane.status.clone().unwrap_or_default();
    let generation = control_plane.metadata.generation;
    let now = ctx.clock.now();

    let observed = ctx.cluster_versions.get().await;
    if let Err(e) = &observed {
        warn!(control_plane = %key, error = %e, "Failed to get ClusterVersion");
    }
    let mut status = with_conditions(
        &original,
        derive_cluster_version_conditions(observed.as_ref(), generation, now),
    );

    let mut rollout_completed = false;
    if control_plane.has_outstanding_rollout() {
        let release = resolve_desired_release(
            &control_plane,
            ctx.control_planes.as_ref(),
            ctx.release_provider.as_ref(),
            ctx.release_lookup_timeout,
        )
        .await?;

        match track_rollout(
            &control_plane,
            &release,
            ctx.cluster_versions.as_ref(),
            ctx.history_fetch_timeout,
            now,
        )
        .await
        {
            RolloutCheck::Completed(promotion) => {
                info!(
                    control_plane = %key,
                    release_image = %promotion.release_image,
                    version = %promotion.version,
                    "Release rollout completed"
                );
                status = promotion.apply(&status);
                rollout_completed = true;
            }
            RolloutCheck::Pending => {}
            RolloutCheck::Skipped(reason) => {
                if let Some(ref metrics) = ctx.metrics {
                    metrics.record_rollout_check_skipped(match reason {
                        HistoryUnavailable::Timeout(_) => "timeout",
                        HistoryUnavailable::Fetch(_) => "fetch_error",
                    });
                }
            }
        }
    }

    if status == original {
        debug!(control_plane = %key, "Status unchanged");
        return Ok(ReconcileOutcome::Unchanged);
    }

    let mut updated = control_plane;
    updated.status = Some(status);

    ctx.control_planes
        .update_status(&updated)
        .await
        .map_err(|e| {
            error!(control_plane = %key, error = %e, "Failed to update status");
            if e.is_conflict() {
                ReconcileError::Conflict(e)
            } else {
                ReconcileError::PersistStatus(e)
            }
        })?;

    info!(control_plane = %key, "Status updated");
    if let Some(ref metrics) = ctx.metrics {
        metrics.record_status_update();
        if rollout_completed {
            metrics.record_rollout_completed();
        }
    }

    Ok(ReconcileOutcome::Updated)
}

/// `kube::runtime::Controller` entry point
///
/// The object handed in by the watcher only supplies the identity; the
/// control plane is re-read so the write carries a fresh resourceVersion.
/// Successful passes wait for the next watch event. Both outcomes are timed
/// into the reconciliation metrics.
pub async fn reconcile(
    control_plane: Arc<HostedControlPlane>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start_time = Instant::now();
    let result = reconcile_object(&control_plane, &ctx).await;

    if let Some(ref metrics) = ctx.metrics {
        let elapsed = start_time.elapsed().as_secs_f64();
        match &result {
            Ok(_) => metrics.record_reconciliation_success(elapsed),
            Err(_) => metrics.record_reconciliation_error(elapsed),
        }
    }

    result.map(|_| Action::await_change())
}

async fn reconcile_object(
    control_plane: &HostedControlPlane,
    ctx: &Context,
) -> Result<ReconcileOutcome, ReconcileError> {
    let namespace = control_plane
        .namespace()
        .ok_or(ReconcileError::MissingNamespace)?;
    let key = ControlPlaneRef::new(&control_plane.name_any()).within(&namespace);

    info!(control_plane = %key, "Reconciling HostedControlPlane");

    let outcome = reconcile_control_plane(&key, ctx).await?;
    debug!(control_plane = %key, outcome = ?outcome, "Reconcile finished");

    Ok(outcome)
}

/// Error policy for the controller
///
/// Uses `warn!` since reconcile errors are expected and retried. Failures are
/// counted by `reconcile`.
pub fn error_policy(
    control_plane: Arc<HostedControlPlane>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!(
        control_plane = %control_plane.name_any(),
        error = %error,
        "Reconcile error (will retry)"
    );

    Action::requeue(ERROR_REQUEUE_DELAY)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "reconcile_test.rs"]
mod tests;
