use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the pull secret every HostedControlPlane namespace carries
pub const PULL_SECRET_NAME: &str = "pull-secret";

/// Key inside the pull secret holding the docker config JSON
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// HostedControlPlane is the management-side view of a hosted cluster
///
/// Only the fields this controller reads or writes are modelled. Unknown
/// fields are ignored on read and left untouched on status writes.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "hypershift.openshift.io",
    version = "v1beta1",
    kind = "HostedControlPlane",
    namespaced,
    status = "HostedControlPlaneStatus",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Release", "type":"string", "jsonPath":".status.releaseImage"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct HostedControlPlaneSpec {
    /// Release image the hosted cluster should be running
    #[serde(rename = "releaseImage")]
    pub release_image: String,
}

/// Status of the HostedControlPlane
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct HostedControlPlaneStatus {
    /// Conditions mirrored from the hosted cluster (and set by other controllers)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Release image whose rollout was last observed to complete
    #[serde(rename = "releaseImage", skip_serializing_if = "Option::is_none")]
    pub release_image: Option<String>,

    /// Semantic version of the applied release image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// When `releaseImage` last changed
    #[serde(
        rename = "lastReleaseImageTransitionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_release_image_transition_time: Option<Time>,
}

impl HostedControlPlane {
    /// Whether the release image in spec has not yet been observed as rolled out
    ///
    /// An absent status image counts as empty, so an empty spec image is
    /// never outstanding.
    pub fn has_outstanding_rollout(&self) -> bool {
        let applied = self
            .status
            .as_ref()
            .and_then(|status| status.release_image.as_deref())
            .unwrap_or("");
        applied != self.spec.release_image
    }
}
