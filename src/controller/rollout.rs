//! Release rollout tracking
//!
//! A rollout is outstanding while `status.releaseImage != spec.releaseImage`.
//! It is declared complete only when the newest ClusterVersion history entry
//! is `Completed` for the version the desired release image carries. Older
//! history entries are never consulted: a version that was applied and then
//! rolled back must not count as rolled out.
//!
//! There is no retry loop here. The outstanding check is re-evaluated on every
//! reconcile until the promotion lands.

use crate::controller::release::{LookupError, ReleaseImage, ReleaseProvider};
use crate::controller::store::{ClusterVersionSource, ControlPlaneStore, StoreError};
use crate::crd::{
    HostedControlPlane, HostedControlPlaneStatus, UpdateHistory, UpdateState,
    DOCKER_CONFIG_JSON_KEY,
};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Deadline for reading ClusterVersion history while tracking a rollout
pub const HISTORY_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for resolving the desired release image
pub const RELEASE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Why the history could not be read this cycle
#[derive(Debug, Error)]
pub enum HistoryUnavailable {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Fetch(#[from] StoreError),
}

/// Status fields to record once a rollout completed
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutPromotion {
    pub release_image: String,
    pub version: String,
    pub transitioned_at: DateTime<Utc>,
}

impl RolloutPromotion {
    /// Return `status` with the promotion applied
    pub fn apply(&self, status: &HostedControlPlaneStatus) -> HostedControlPlaneStatus {
        HostedControlPlaneStatus {
            release_image: Some(self.release_image.clone()),
            version: Some(self.version.clone()),
            last_release_image_transition_time: Some(Time(self.transitioned_at)),
            ..status.clone()
        }
    }
}

/// Outcome of one rollout check
#[derive(Debug)]
pub enum RolloutCheck {
    /// The desired release is rolled out; record it
    Completed(RolloutPromotion),
    /// History was read but the rollout is not done
    Pending,
    /// History could not be read; try again next reconcile
    Skipped(HistoryUnavailable),
}

/// Whether the newest history entry reports `version` as completed
pub fn is_rollout_complete(history: &[UpdateHistory], version: &str) -> bool {
    history
        .first()
        .map(|latest| latest.version == version && latest.state == UpdateState::Completed)
        .unwrap_or(false)
}

/// Resolve the version of `spec.releaseImage`
///
/// Reads the pull secret from the control plane's namespace and calls the
/// release provider under `timeout`. Every failure here is fatal to the
/// reconcile.
pub async fn resolve_desired_release(
    control_plane: &HostedControlPlane,
    store: &dyn ControlPlaneStore,
    provider: &dyn ReleaseProvider,
    timeout: Duration,
) -> Result<ReleaseImage, LookupError> {
    let namespace = control_plane.metadata.namespace.as_deref().ok_or(
        LookupError::PullSecret(StoreError::MissingMetadata {
            kind: "HostedControlPlane",
            field: "namespace",
        }),
    )?;

    let pull_secret = store
        .get_pull_secret(namespace)
        .await
        .map_err(LookupError::PullSecret)?;
    let docker_config = pull_secret
        .data
        .as_ref()
        .and_then(|data| data.get(DOCKER_CONFIG_JSON_KEY))
        .ok_or(LookupError::MissingPullSecretKey(DOCKER_CONFIG_JSON_KEY))?;

    tokio::time::timeout(
        timeout,
        provider.lookup(&control_plane.spec.release_image, &docker_config.0),
    )
    .await
    .map_err(|_| LookupError::Timeout(timeout))?
}

/// Read ClusterVersion history, giving up after `timeout`
pub async fn fetch_history(
    source: &dyn ClusterVersionSource,
    timeout: Duration,
) -> Result<Vec<UpdateHistory>, HistoryUnavailable> {
    let cluster_version = tokio::time::timeout(timeout, source.get())
        .await
        .map_err(|_| HistoryUnavailable::Timeout(timeout))??;

    Ok(cluster_version
        .status
        .map(|status| status.history)
        .unwrap_or_default())
}

/// Check whether the rollout to `release` has completed
///
/// Only call this while a rollout is outstanding.
pub async fn track_rollout(
    control_plane: &HostedControlPlane,
    release: &ReleaseImage,
    source: &dyn ClusterVersionSource,
    timeout: Duration,
    now: DateTime<Utc>,
) -> RolloutCheck {
    let history = match fetch_history(source, timeout).await {
        Ok(history) => history,
        Err(e) => {
            info!(
                error = %e,
                "Failed to get clusterversion, can't determine image version rollout status"
            );
            return RolloutCheck::Skipped(e);
        }
    };

    if !is_rollout_complete(&history, release.version()) {
        debug!(
            desired_version = %release.version(),
            latest_version = ?history.first().map(|h| h.version.as_str()),
            latest_state = ?history.first().map(|h| &h.state),
            "Rollout still in progress"
        );
        return RolloutCheck::Pending;
    }

    RolloutCheck::Completed(RolloutPromotion {
        release_image: control_plane.spec.release_image.clone(),
        version: release.version().to_string(),
        transitioned_at: now,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "rollout_test.rs"]
mod tests;
