//! Custom resource types read and written by the controller
//!
//! - `HostedControlPlane` lives in the management cluster; we write its status.
//! - `ClusterVersion` lives in the hosted cluster; we only read it.

pub mod cluster_version;
pub mod control_plane;

pub use cluster_version::{
    ClusterOperatorStatusCondition, ClusterVersion, ClusterVersionSpec, ClusterVersionStatus,
    UpdateHistory, UpdateState, CLUSTER_VERSION_NAME,
};
pub use control_plane::{
    HostedControlPlane, HostedControlPlaneSpec, HostedControlPlaneStatus,
    DOCKER_CONFIG_JSON_KEY, PULL_SECRET_NAME,
};

#[cfg(test)]
#[path = "crd_test.rs"]
mod tests;
