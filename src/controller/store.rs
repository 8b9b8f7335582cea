//! Resource access for the reconciler
//!
//! Two clusters are involved:
//! - the management cluster holds the HostedControlPlane and its pull secret
//! - the hosted cluster holds ClusterVersion `version`
//!
//! Both are behind traits so the reconciler can be exercised without a cluster.
//! Production code uses the kube-backed stores, tests use the in-memory mocks.

use crate::crd::{ClusterVersion, HostedControlPlane, CLUSTER_VERSION_NAME, PULL_SECRET_NAME};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::reflector::ObjectRef;
use kube::Client;
use thiserror::Error;

pub type ControlPlaneRef = ObjectRef<HostedControlPlane>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("conflict writing {kind} {name}: {message}")]
    Conflict {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        kind: &'static str,
        field: &'static str,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    /// Classify a kube error: 404 and 409 get their own variants
    fn from_kube(kind: &'static str, name: impl Into<String>, error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ref status) if status.code == 404 => StoreError::NotFound {
                kind,
                name: name.into(),
            },
            kube::Error::Api(ref status) if status.code == 409 => StoreError::Conflict {
                kind,
                name: name.into(),
                message: status.message.clone(),
            },
            other => StoreError::Kube(other),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Management-cluster access
#[async_trait]
pub trait ControlPlaneStore: Send + Sync {
    async fn get(&self, key: &ControlPlaneRef) -> Result<HostedControlPlane, StoreError>;

    /// Write `control_plane.status` through the status subresource
    ///
    /// The write is conditional on `metadata.resourceVersion`; a stale object
    /// yields `StoreError::Conflict`.
    async fn update_status(&self, control_plane: &HostedControlPlane) -> Result<(), StoreError>;

    /// Fetch the pull secret of a HostedControlPlane namespace
    async fn get_pull_secret(&self, namespace: &str) -> Result<Secret, StoreError>;
}

/// Hosted-cluster access
#[async_trait]
pub trait ClusterVersionSource: Send + Sync {
    async fn get(&self) -> Result<ClusterVersion, StoreError>;
}

/// `ControlPlaneStore` backed by the management cluster API server
pub struct KubeControlPlaneStore {
    client: Client,
}

impl KubeControlPlaneStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlaneStore for KubeControlPlaneStore {
    async fn get(&self, key: &ControlPlaneRef) -> Result<HostedControlPlane, StoreError> {
        let namespace = key.namespace.as_deref().ok_or(StoreError::MissingMetadata {
            kind: "HostedControlPlane",
            field: "namespace",
        })?;
        let api: Api<HostedControlPlane> = Api::namespaced(self.client.clone(), namespace);
        api.get(&key.name)
            .await
            .map_err(|e| StoreError::from_kube("HostedControlPlane", key.to_string(), e))
    }

    async fn update_status(&self, control_plane: &HostedControlPlane) -> Result<(), StoreError> {
        let namespace =
            control_plane
                .metadata
                .namespace
                .as_deref()
                .ok_or(StoreError::MissingMetadata {
                    kind: "HostedControlPlane",
                    field: "namespace",
                })?;
        let name = control_plane
            .metadata
            .name
            .as_deref()
            .ok_or(StoreError::MissingMetadata {
                kind: "HostedControlPlane",
                field: "name",
            })?;

        // resourceVersion in a merge patch is a precondition: the API server
        // answers 409 if the object moved on since we read it.
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": control_plane.metadata.resource_version,
            },
            "status": control_plane.status,
        });

        let api: Api<HostedControlPlane> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| {
                StoreError::from_kube("HostedControlPlane", format!("{}/{}", namespace, name), e)
            })?;
        Ok(())
    }

    async fn get_pull_secret(&self, namespace: &str) -> Result<Secret, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(PULL_SECRET_NAME).await.map_err(|e| {
            StoreError::from_kube("Secret", format!("{}/{}", namespace, PULL_SECRET_NAME), e)
        })
    }
}

/// `ClusterVersionSource` backed by the hosted cluster API server
pub struct KubeClusterVersionSource {
    client: Client,
}

impl KubeClusterVersionSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterVersionSource for KubeClusterVersionSource {
    async fn get(&self) -> Result<ClusterVersion, StoreError> {
        let api: Api<ClusterVersion> = Api::all(self.client.clone());
        api.get(CLUSTER_VERSION_NAME)
            .await
            .map_err(|e| StoreError::from_kube("ClusterVersion", CLUSTER_VERSION_NAME, e))
    }
}

/// In-memory management cluster for tests
///
/// Successful status updates are written back to the stored object so a
/// second reconcile sees what the first one persisted.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub struct MockControlPlaneStore {
    control_plane: std::sync::Mutex<Option<HostedControlPlane>>,
    pull_secret: std::sync::Mutex<Option<Secret>>,
    updates: std::sync::Mutex<Vec<HostedControlPlane>>,
    conflict_on_update: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockControlPlaneStore {
    pub fn new(control_plane: Option<HostedControlPlane>) -> Self {
        Self {
            control_plane: std::sync::Mutex::new(control_plane),
            pull_secret: std::sync::Mutex::new(None),
            updates: std::sync::Mutex::new(Vec::new()),
            conflict_on_update: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn with_pull_secret(self, secret: Secret) -> Self {
        *self.pull_secret.lock().unwrap() = Some(secret);
        self
    }

    pub fn set_conflict_on_update(&self, conflict: bool) {
        self.conflict_on_update
            .store(conflict, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<HostedControlPlane> {
        self.updates.lock().unwrap().clone()
    }

    pub fn current(&self) -> Option<HostedControlPlane> {
        self.control_plane.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl ControlPlaneStore for MockControlPlaneStore {
    async fn get(&self, key: &ControlPlaneRef) -> Result<HostedControlPlane, StoreError> {
        self.control_plane
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::NotFound {
                kind: "HostedControlPlane",
                name: key.to_string(),
            })
    }

    async fn update_status(&self, control_plane: &HostedControlPlane) -> Result<(), StoreError> {
        if self
            .conflict_on_update
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(StoreError::Conflict {
                kind: "HostedControlPlane",
                name: control_plane.metadata.name.clone().unwrap_or_default(),
                message: "the object has been modified".to_string(),
            });
        }
        self.updates.lock().unwrap().push(control_plane.clone());
        *self.control_plane.lock().unwrap() = Some(control_plane.clone());
        Ok(())
    }

    async fn get_pull_secret(&self, namespace: &str) -> Result<Secret, StoreError> {
        self.pull_secret
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::NotFound {
                kind: "Secret",
                name: format!("{}/{}", namespace, PULL_SECRET_NAME),
            })
    }
}

/// In-memory hosted cluster for tests
///
/// Responses are consumed in order; the last one repeats. `None` answers
/// with `StoreError::NotFound`. An optional delay simulates a slow API server.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub struct MockClusterVersionSource {
    responses: std::sync::Mutex<std::collections::VecDeque<Option<ClusterVersion>>>,
    delay: Option<std::time::Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl MockClusterVersionSource {
    pub fn new(response: Option<ClusterVersion>) -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::from(vec![response])),
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn then(self, response: Option<ClusterVersion>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[async_trait]
impl ClusterVersionSource for MockClusterVersionSource {
    async fn get(&self) -> Result<ClusterVersion, StoreError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.pop_front().flatten()
            } else {
                responses.front().cloned().flatten()
            }
        };

        response.ok_or_else(|| StoreError::NotFound {
            kind: "ClusterVersion",
            name: CLUSTER_VERSION_NAME.to_string(),
        })
    }
}
