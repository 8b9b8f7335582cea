//! Hosted-cluster `ClusterVersion` (config.openshift.io/v1)
//!
//! Owned by the cluster-version operator (CVO). Read-only to this controller.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The only ClusterVersion object a cluster has
pub const CLUSTER_VERSION_NAME: &str = "version";

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "ClusterVersion",
    status = "ClusterVersionStatus"
)]
pub struct ClusterVersionSpec {
    #[serde(rename = "clusterID", skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ClusterVersionStatus {
    /// Conditions reported by the CVO. Unlike `metav1.Condition`, reason and
    /// message are optional here.
    #[serde(default)]
    pub conditions: Vec<ClusterOperatorStatusCondition>,

    /// Update history, most recent first
    #[serde(default)]
    pub history: Vec<UpdateHistory>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct ClusterOperatorStatusCondition {
    #[serde(rename = "type")]
    pub type_: String,

    /// True, False or Unknown
    pub status: String,

    #[serde(rename = "lastTransitionTime", skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Terminal state of a history entry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub enum UpdateState {
    /// The update was fully applied
    Completed,
    /// The update is in progress or was interrupted
    Partial,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct UpdateHistory {
    pub state: UpdateState,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub image: String,

    #[serde(rename = "startedTime", skip_serializing_if = "Option::is_none")]
    pub started_time: Option<Time>,

    #[serde(rename = "completionTime", skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,

    #[serde(default)]
    pub verified: bool,
}

impl ClusterVersion {
    /// Conditions reported by the CVO, empty when no status was written yet
    pub fn conditions(&self) -> &[ClusterOperatorStatusCondition] {
        self.status
            .as_ref()
            .map(|status| status.conditions.as_slice())
            .unwrap_or_default()
    }
}
