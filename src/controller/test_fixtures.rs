//! Builders for HostedControlPlane / ClusterVersion objects used across tests

use crate::crd::{
    ClusterOperatorStatusCondition, ClusterVersion, ClusterVersionSpec, ClusterVersionStatus,
    HostedControlPlane, HostedControlPlaneSpec, HostedControlPlaneStatus, UpdateHistory,
    UpdateState, CLUSTER_VERSION_NAME, DOCKER_CONFIG_JSON_KEY, PULL_SECRET_NAME,
};
use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "clusters-example";
pub const NAME: &str = "example";

pub const IMAGE_4_12_0: &str = "quay.io/openshift-release-dev/ocp-release:4.12.0-x86_64";
pub const IMAGE_4_12_1: &str = "quay.io/openshift-release-dev/ocp-release:4.12.1-x86_64";

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 10, 12, 0, 0).unwrap()
}

pub fn control_plane(desired: &str, applied: Option<&str>, generation: i64) -> HostedControlPlane {
    let mut hcp = HostedControlPlane::new(
        NAME,
        HostedControlPlaneSpec {
            release_image: desired.to_string(),
        },
    );
    hcp.metadata.namespace = Some(NAMESPACE.to_string());
    hcp.metadata.generation = Some(generation);
    hcp.metadata.resource_version = Some("1000".to_string());
    hcp.status = Some(HostedControlPlaneStatus {
        release_image: applied.map(str::to_string),
        version: applied.map(|_| "4.12.0".to_string()),
        ..Default::default()
    });
    hcp
}

pub fn cvo_condition(
    type_: &str,
    status: &str,
    reason: Option<&str>,
    message: Option<&str>,
) -> ClusterOperatorStatusCondition {
    ClusterOperatorStatusCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        last_transition_time: None,
        reason: reason.map(str::to_string),
        message: message.map(str::to_string),
    }
}

/// A healthy CVO: all five mirrored conditions present with reasons
pub fn healthy_cvo_conditions() -> Vec<ClusterOperatorStatusCondition> {
    vec![
        cvo_condition("Failing", "False", Some("AsExpected"), Some("")),
        cvo_condition(
            "ReleaseAccepted",
            "True",
            Some("PayloadLoaded"),
            Some("Payload loaded version=\"4.12.1\""),
        ),
        cvo_condition(
            "Progressing",
            "False",
            Some("AsExpected"),
            Some("Cluster version is 4.12.1"),
        ),
        cvo_condition("Upgradeable", "True", Some("AsExpected"), None),
        cvo_condition(
            "Available",
            "True",
            Some("AsExpected"),
            Some("Done applying 4.12.1"),
        ),
    ]
}

pub fn history(version: &str, state: UpdateState) -> UpdateHistory {
    UpdateHistory {
        state,
        version: version.to_string(),
        image: format!("quay.io/openshift-release-dev/ocp-release:{}-x86_64", version),
        started_time: None,
        completion_time: None,
        verified: false,
    }
}

pub fn cluster_version(
    conditions: Vec<ClusterOperatorStatusCondition>,
    history: Vec<UpdateHistory>,
) -> ClusterVersion {
    let mut cv = ClusterVersion::new(CLUSTER_VERSION_NAME, ClusterVersionSpec::default());
    cv.status = Some(ClusterVersionStatus {
        conditions,
        history,
    });
    cv
}

pub fn pull_secret() -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        DOCKER_CONFIG_JSON_KEY.to_string(),
        ByteString(br#"{"auths":{"quay.io":{"auth":"dXNlcjpwYXNz"}}}"#.to_vec()),
    );
    Secret {
        metadata: ObjectMeta {
            name: Some(PULL_SECRET_NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(data),
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        ..Default::default()
    }
}
