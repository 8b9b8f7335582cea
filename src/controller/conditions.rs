//! Mirror ClusterVersion conditions onto the HostedControlPlane
//!
//! The mapping between the two condition vocabularies is a static table.
//! Deriving conditions never fails: an unreachable ClusterVersion or a missing
//! condition turns into an `Unknown` condition with reason `StatusUnknown`.

use crate::controller::store::StoreError;
use crate::crd::{ClusterOperatorStatusCondition, ClusterVersion, HostedControlPlaneStatus};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use std::fmt;

/// Reason used whenever the CVO state could not be determined
pub const STATUS_UNKNOWN_REASON: &str = "StatusUnknown";

/// Reason used when the CVO reported a condition without a reason
///
/// `metav1.Condition` requires a non-empty reason, the CVO schema does not.
pub const FROM_CLUSTER_VERSION_REASON: &str = "FromClusterVersion";

/// Message used when the CVO does not report a mapped condition
pub const CONDITION_NOT_FOUND_MESSAGE: &str = "Condition not found in the CVO.";

/// Condition types this controller owns on the HostedControlPlane
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlPlaneConditionType {
    ClusterVersionFailing,
    ClusterVersionReleaseAccepted,
    ClusterVersionProgressing,
    ClusterVersionUpgradeable,
    ClusterVersionAvailable,
}

impl ControlPlaneConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlPlaneConditionType::ClusterVersionFailing => "ClusterVersionFailing",
            ControlPlaneConditionType::ClusterVersionReleaseAccepted => {
                "ClusterVersionReleaseAccepted"
            }
            ControlPlaneConditionType::ClusterVersionProgressing => "ClusterVersionProgressing",
            ControlPlaneConditionType::ClusterVersionUpgradeable => "ClusterVersionUpgradeable",
            ControlPlaneConditionType::ClusterVersionAvailable => "ClusterVersionAvailable",
        }
    }
}

impl fmt::Display for ControlPlaneConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the condition mapping table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConditionMapping {
    pub condition_type: ControlPlaneConditionType,
    pub cluster_version_type: &'static str,
}

/// HostedControlPlane condition → ClusterVersion condition it mirrors
///
/// Order here is the order new conditions are appended to the status.
pub const CLUSTER_VERSION_CONDITIONS: [ConditionMapping; 5] = [
    ConditionMapping {
        condition_type: ControlPlaneConditionType::ClusterVersionFailing,
        cluster_version_type: "Failing",
    },
    ConditionMapping {
        condition_type: ControlPlaneConditionType::ClusterVersionReleaseAccepted,
        cluster_version_type: "ReleaseAccepted",
    },
    ConditionMapping {
        condition_type: ControlPlaneConditionType::ClusterVersionProgressing,
        cluster_version_type: "Progressing",
    },
    ConditionMapping {
        condition_type: ControlPlaneConditionType::ClusterVersionUpgradeable,
        cluster_version_type: "Upgradeable",
    },
    ConditionMapping {
        condition_type: ControlPlaneConditionType::ClusterVersionAvailable,
        cluster_version_type: "Available",
    },
];

/// Find a CVO condition by type
pub fn find_cluster_version_condition<'a>(
    conditions: &'a [ClusterOperatorStatusCondition],
    condition_type: &str,
) -> Option<&'a ClusterOperatorStatusCondition> {
    conditions
        .iter()
        .find(|condition| condition.type_ == condition_type)
}

/// Derive one HostedControlPlane condition from the observed ClusterVersion
///
/// A fetch error wins over a missing condition. `now` only matters if the
/// condition ends up being inserted or changing status.
pub fn derive_condition(
    mapping: &ConditionMapping,
    observed: Result<&ClusterVersion, &StoreError>,
    generation: Option<i64>,
    now: DateTime<Utc>,
) -> Condition {
    let unknown = |message: String| Condition {
        type_: mapping.condition_type.to_string(),
        status: "Unknown".to_string(),
        reason: STATUS_UNKNOWN_REASON.to_string(),
        message,
        observed_generation: generation,
        last_transition_time: Time(now),
    };

    let cluster_version = match observed {
        Ok(cluster_version) => cluster_version,
        Err(e) => return unknown(format!("failed to get clusterVersion: {}", e)),
    };

    let Some(cvo_condition) =
        find_cluster_version_condition(cluster_version.conditions(), mapping.cluster_version_type)
    else {
        return unknown(CONDITION_NOT_FOUND_MESSAGE.to_string());
    };

    let reason = match cvo_condition.reason.as_deref() {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => FROM_CLUSTER_VERSION_REASON.to_string(),
    };

    Condition {
        type_: mapping.condition_type.to_string(),
        status: cvo_condition.status.clone(),
        reason,
        message: cvo_condition.message.clone().unwrap_or_default(),
        observed_generation: generation,
        last_transition_time: Time(now),
    }
}

/// Derive every condition in `CLUSTER_VERSION_CONDITIONS`, in table order
pub fn derive_cluster_version_conditions(
    observed: Result<&ClusterVersion, &StoreError>,
    generation: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<Condition> {
    CLUSTER_VERSION_CONDITIONS
        .iter()
        .map(|mapping| derive_condition(mapping, observed, generation, now))
        .collect()
}

/// Set a condition with `meta.SetStatusCondition` semantics
///
/// - absent: appended as given
/// - present: status and transition time change only if status differs;
///   reason, message and observed generation are always refreshed
///
/// Returns true if `conditions` changed.
pub fn set_status_condition(conditions: &mut Vec<Condition>, new_condition: Condition) -> bool {
    let Some(existing) = conditions
        .iter_mut()
        .find(|condition| condition.type_ == new_condition.type_)
    else {
        conditions.push(new_condition);
        return true;
    };

    let mut changed = false;

    if existing.status != new_condition.status {
        existing.status = new_condition.status;
        existing.last_transition_time = new_condition.last_transition_time;
        changed = true;
    }
    if existing.reason != new_condition.reason {
        existing.reason = new_condition.reason;
        changed = true;
    }
    if existing.message != new_condition.message {
        existing.message = new_condition.message;
        changed = true;
    }
    if existing.observed_generation != new_condition.observed_generation {
        existing.observed_generation = new_condition.observed_generation;
        changed = true;
    }

    changed
}

/// Return `status` with the derived conditions applied
pub fn with_conditions(
    status: &HostedControlPlaneStatus,
    derived: Vec<Condition>,
) -> HostedControlPlaneStatus {
    let mut next = status.clone();
    for condition in derived {
        set_status_condition(&mut next.conditions, condition);
    }
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "conditions_test.rs"]
mod tests;
