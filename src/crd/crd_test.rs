#![allow(clippy::unwrap_used)] // Tests can use unwrap for brevity
#![allow(clippy::expect_used)] // Tests can use expect for better error messages

use super::*;
use kube::CustomResourceExt;

#[test]
fn test_hosted_control_plane_deserialize_ignores_unknown_fields() {
    let yaml = r#"
apiVersion: hypershift.openshift.io/v1beta1
kind: HostedControlPlane
metadata:
  name: example
  namespace: clusters-example
  generation: 7
spec:
  releaseImage: quay.io/openshift-release-dev/ocp-release:4.12.1-x86_64
  platform:
    type: AWS
status:
  ready: true
  releaseImage: quay.io/openshift-release-dev/ocp-release:4.12.0-x86_64
  version: 4.12.0
  lastReleaseImageTransitionTime: "2023-01-10T12:00:00Z"
  conditions:
  - type: ClusterVersionAvailable
    status: "True"
    reason: AsExpected
    message: Done applying 4.12.0
    observedGeneration: 6
    lastTransitionTime: "2023-01-10T12:00:00Z"
"#;

    let hcp: HostedControlPlane =
        serde_yaml::from_str(yaml).expect("Failed to deserialize HostedControlPlane");

    assert_eq!(hcp.metadata.generation, Some(7));
    assert_eq!(
        hcp.spec.release_image,
        "quay.io/openshift-release-dev/ocp-release:4.12.1-x86_64"
    );

    let status = hcp.status.as_ref().unwrap();
    assert_eq!(status.version.as_deref(), Some("4.12.0"));
    assert_eq!(status.conditions.len(), 1);
    assert_eq!(status.conditions[0].type_, "ClusterVersionAvailable");
    assert_eq!(status.conditions[0].observed_generation, Some(6));
    assert!(status.last_release_image_transition_time.is_some());

    assert!(hcp.has_outstanding_rollout());
}

#[test]
fn test_no_outstanding_rollout_when_release_images_match() {
    let yaml = r#"
apiVersion: hypershift.openshift.io/v1beta1
kind: HostedControlPlane
metadata:
  name: example
  namespace: clusters-example
spec:
  releaseImage: quay.io/openshift-release-dev/ocp-release:4.12.1-x86_64
status:
  releaseImage: quay.io/openshift-release-dev/ocp-release:4.12.1-x86_64
"#;
    let hcp: HostedControlPlane = serde_yaml::from_str(yaml).unwrap();
    assert!(!hcp.has_outstanding_rollout());
}

#[test]
fn test_missing_status_counts_as_outstanding_rollout() {
    let yaml = r#"
apiVersion: hypershift.openshift.io/v1beta1
kind: HostedControlPlane
metadata:
  name: example
  namespace: clusters-example
spec:
  releaseImage: quay.io/openshift-release-dev/ocp-release:4.12.1-x86_64
"#;
    let hcp: HostedControlPlane = serde_yaml::from_str(yaml).unwrap();
    assert!(hcp.status.is_none());
    assert!(hcp.has_outstanding_rollout());
}

#[test]
fn test_empty_release_image_without_status_is_not_outstanding() {
    let yaml = r#"
apiVersion: hypershift.openshift.io/v1beta1
kind: HostedControlPlane
metadata:
  name: example
  namespace: clusters-example
spec:
  releaseImage: ""
"#;
    let hcp: HostedControlPlane = serde_yaml::from_str(yaml).unwrap();
    assert!(hcp.status.is_none());
    assert!(!hcp.has_outstanding_rollout());

    let mut hcp = hcp;
    hcp.status = Some(HostedControlPlaneStatus::default());
    assert!(!hcp.has_outstanding_rollout());
}

#[test]
fn test_cluster_version_deserialize_conditions_and_history() {
    let yaml = r#"
apiVersion: config.openshift.io/v1
kind: ClusterVersion
metadata:
  name: version
spec:
  clusterID: 5d3e4b0a-0000-0000-0000-000000000000
  channel: stable-4.12
status:
  desired:
    version: 4.12.1
  conditions:
  - type: Available
    status: "True"
    message: Done applying 4.12.1
    lastTransitionTime: "2023-01-10T12:00:00Z"
  - type: Failing
    status: "False"
    reason: ""
  history:
  - state: Completed
    version: 4.12.1
    image: quay.io/openshift-release-dev/ocp-release@sha256:abc
    verified: false
    startedTime: "2023-01-10T11:00:00Z"
    completionTime: "2023-01-10T12:00:00Z"
  - state: Partial
    version: 4.12.0
    image: quay.io/openshift-release-dev/ocp-release@sha256:def
"#;

    let cv: ClusterVersion =
        serde_yaml::from_str(yaml).expect("Failed to deserialize ClusterVersion");

    assert_eq!(cv.metadata.name.as_deref(), Some(CLUSTER_VERSION_NAME));
    assert_eq!(cv.conditions().len(), 2);
    assert_eq!(cv.conditions()[0].reason, None);
    assert_eq!(cv.conditions()[1].reason.as_deref(), Some(""));

    let history = &cv.status.as_ref().unwrap().history;
    assert_eq!(history.len(), 2);
    let latest = &history[0];
    assert_eq!(latest.state, UpdateState::Completed);
    assert_eq!(latest.version, "4.12.1");
    assert!(latest.completion_time.is_some());
}

#[test]
fn test_cluster_version_without_status_has_no_conditions() {
    let yaml = r#"
apiVersion: config.openshift.io/v1
kind: ClusterVersion
metadata:
  name: version
spec: {}
"#;
    let cv: ClusterVersion = serde_yaml::from_str(yaml).unwrap();
    assert!(cv.conditions().is_empty());
    assert!(cv.status.is_none());
}

#[test]
fn test_crds_are_scoped_correctly() {
    let hcp_crd = HostedControlPlane::crd();
    assert_eq!(hcp_crd.spec.scope, "Namespaced");
    assert_eq!(hcp_crd.spec.group, "hypershift.openshift.io");

    let cv_crd = ClusterVersion::crd();
    assert_eq!(cv_crd.spec.scope, "Cluster");
    assert_eq!(cv_crd.spec.names.kind, "ClusterVersion");
}

#[test]
fn test_hosted_control_plane_crd_schema_covers_status() {
    let crd = serde_json::to_value(HostedControlPlane::crd()).unwrap();
    let schema = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"];
    let status = &schema["properties"]["status"]["properties"];

    let conditions = &status["conditions"];
    assert_eq!(conditions["type"], "array");
    let condition = &conditions["items"]["properties"];
    for field in ["type", "status", "reason", "message", "lastTransitionTime"] {
        assert!(
            condition.get(field).is_some(),
            "condition schema is missing {}",
            field
        );
    }

    assert_eq!(status["lastReleaseImageTransitionTime"]["type"], "string");
    assert_eq!(status["lastReleaseImageTransitionTime"]["format"], "date-time");
    assert_eq!(
        schema["properties"]["spec"]["properties"]["releaseImage"]["type"],
        "string"
    );
}
