//! Release image lookup
//!
//! Resolves a release image reference to the semantic version it carries.
//! - `ReleaseProvider` trait for abstraction
//! - `RegistryReleaseProvider` reads the version label from the image registry
//! - `CachedReleaseProvider` memoizes lookups per image reference
//! - `MockReleaseProvider` for testing

pub mod registry;

pub use registry::{ImageReference, RegistryReleaseProvider, RELEASE_VERSION_LABEL};

use crate::controller::store::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to get pull secret: {0}")]
    PullSecret(#[source] StoreError),

    #[error("pull secret has no {0} key")]
    MissingPullSecretKey(&'static str),

    #[error("invalid pull secret: {0}")]
    InvalidPullSecret(String),

    #[error("invalid image reference {image:?}: {reason}")]
    InvalidImageReference { image: String, reason: String },

    #[error("registry request failed: {0}")]
    Registry(String),

    #[error("release image {0} has no {label} label", label = RELEASE_VERSION_LABEL)]
    MissingVersionLabel(String),

    #[error("release image lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// A release image and the version it delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseImage {
    image: String,
    version: String,
}

impl ReleaseImage {
    pub fn new(image: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            version: version.into(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// Resolves release images, possibly over the network
#[async_trait]
pub trait ReleaseProvider: Send + Sync {
    /// Look up `image`, authenticating with the docker config JSON in `pull_secret`
    async fn lookup(&self, image: &str, pull_secret: &[u8]) -> Result<ReleaseImage, LookupError>;
}

/// Caches successful lookups by image reference
///
/// Failures are not cached, the next reconcile retries them. Entries are
/// never evicted: the controller serves a single HostedControlPlane whose
/// release images are immutable, so the key set stays as small as its upgrade
/// history. Do not share one cache across many control planes.
pub struct CachedReleaseProvider<P> {
    inner: P,
    cache: Mutex<HashMap<String, ReleaseImage>>,
}

impl<P: ReleaseProvider> CachedReleaseProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<P: ReleaseProvider> ReleaseProvider for CachedReleaseProvider<P> {
    async fn lookup(&self, image: &str, pull_secret: &[u8]) -> Result<ReleaseImage, LookupError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(release) = cache.get(image) {
                return Ok(release.clone());
            }
        }

        let release = self.inner.lookup(image, pull_secret).await?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(image.to_string(), release.clone());
        }
        Ok(release)
    }
}

/// Mock provider with a fixed image → version table
#[cfg(test)]
pub struct MockReleaseProvider {
    versions: HashMap<String, String>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockReleaseProvider {
    pub fn new() -> Self {
        Self {
            versions: HashMap::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_release(mut self, image: &str, version: &str) -> Self {
        self.versions.insert(image.to_string(), version.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl ReleaseProvider for MockReleaseProvider {
    async fn lookup(&self, image: &str, _pull_secret: &[u8]) -> Result<ReleaseImage, LookupError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.versions
            .get(image)
            .map(|version| ReleaseImage::new(image, version.clone()))
            .ok_or_else(|| LookupError::Registry(format!("manifest unknown: {}", image)))
    }
}
