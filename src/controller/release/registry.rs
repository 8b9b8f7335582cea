//! Release version lookup over the OCI distribution API
//!
//! OpenShift release images label their config with `io.openshift.release`.
//! Resolving a release image therefore means:
//! 1. fetch the manifest (following a manifest list to linux/amd64)
//! 2. fetch the config blob the manifest points at
//! 3. read the label
//!
//! Registries that answer 401 with a `Bearer` challenge get a token request
//! first, authenticated with the pull secret's credentials for that host.

use super::{LookupError, ReleaseImage, ReleaseProvider};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Image config label carrying the release version
pub const RELEASE_VERSION_LABEL: &str = "io.openshift.release";

const DOCKER_HUB: &str = "docker.io";
const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

const MANIFEST_MEDIA_TYPES: &str = "application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

/// A parsed `registry/repository[:tag|@digest]` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    /// Tag or digest
    pub reference: String,
}

impl ImageReference {
    pub fn parse(image: &str) -> Result<Self, LookupError> {
        let invalid = |reason: &str| LookupError::InvalidImageReference {
            image: image.to_string(),
            reason: reason.to_string(),
        };

        if image.is_empty() || image.chars().any(char::is_whitespace) {
            return Err(invalid("empty or contains whitespace"));
        }

        let (name, reference) = match image.split_once('@') {
            Some((name, digest)) => (strip_tag(name).0, digest),
            None => {
                let (name, tag) = strip_tag(image);
                (name, tag.unwrap_or("latest"))
            }
        };
        if reference.is_empty() {
            return Err(invalid("empty tag or digest"));
        }

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            Some(_) => (DOCKER_HUB.to_string(), name.to_string()),
            None => (DOCKER_HUB.to_string(), format!("library/{}", name)),
        };
        if repository.is_empty() {
            return Err(invalid("empty repository"));
        }

        Ok(Self {
            registry,
            repository,
            reference: reference.to_string(),
        })
    }

    fn api_host(&self) -> &str {
        if self.registry == DOCKER_HUB {
            DOCKER_HUB_API_HOST
        } else {
            &self.registry
        }
    }

    /// Scheme and host the registry API is served from
    fn base_url(&self) -> String {
        format!("https://{}", self.api_host())
    }

    fn manifest_url(&self, base_url: &str, reference: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            base_url.trim_end_matches('/'),
            self.repository,
            reference
        )
    }

    fn blob_url(&self, base_url: &str, digest: &str) -> String {
        format!(
            "{}/v2/{}/blobs/{}",
            base_url.trim_end_matches('/'),
            self.repository,
            digest
        )
    }
}

/// Split `name[:tag]`, only looking for ':' after the last '/'
fn strip_tag(image: &str) -> (&str, Option<&str>) {
    let last_component = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_component..].rfind(':') {
        Some(i) => {
            let split = last_component + i;
            (&image[..split], Some(&image[split + 1..]))
        }
        None => (image, None),
    }
}

#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Deserialize)]
struct DockerAuth {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Reduce a docker config `auths` key to a bare host
fn normalize_auth_key(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key)
}

fn is_docker_hub(host: &str) -> bool {
    matches!(
        host,
        DOCKER_HUB | DOCKER_HUB_API_HOST | "index.docker.io" | "registry.hub.docker.com"
    )
}

/// Basic credentials (base64 `user:password`) for `registry`, if the pull secret has any
pub(crate) fn registry_credentials(
    pull_secret: &[u8],
    registry: &str,
) -> Result<Option<String>, LookupError> {
    let config: DockerConfig = serde_json::from_slice(pull_secret)
        .map_err(|e| LookupError::InvalidPullSecret(e.to_string()))?;

    let auth = config.auths.iter().find_map(|(key, auth)| {
        let host = normalize_auth_key(key);
        let is_match = host == registry || (is_docker_hub(registry) && is_docker_hub(host));
        is_match.then_some(auth)
    });

    Ok(auth.and_then(|auth| match (&auth.auth, &auth.username, &auth.password) {
        (Some(encoded), _, _) if !encoded.is_empty() => Some(encoded.clone()),
        (_, Some(username), Some(password)) => {
            Some(STANDARD.encode(format!("{}:{}", username, password)))
        }
        _ => None,
    }))
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

pub(crate) fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let (scheme, params) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    // Values may be quoted and contain commas (scope="repository:a:pull,push").
    let mut values = HashMap::new();
    let mut in_quotes = false;
    let mut start = 0;
    let bytes = params.as_bytes();
    for i in 0..=bytes.len() {
        let at_end = i == bytes.len();
        if !at_end && bytes[i] == b'"' {
            in_quotes = !in_quotes;
        }
        if at_end || (bytes[i] == b',' && !in_quotes) {
            if let Some((key, value)) = params[start..i].split_once('=') {
                values.insert(
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
            start = i + 1;
        }
    }

    Some(BearerChallenge {
        realm: values.remove("realm")?,
        service: values.remove("service"),
        scope: values.remove("scope"),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    config: Option<Descriptor>,
    #[serde(default)]
    manifests: Vec<PlatformDescriptor>,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct PlatformDescriptor {
    digest: String,
    platform: Option<Platform>,
}

#[derive(Debug, Deserialize)]
struct Platform {
    os: String,
    architecture: String,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    config: Option<ContainerConfig>,
}

#[derive(Debug, Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Labels")]
    labels: Option<HashMap<String, String>>,
}

/// Pick the linux/amd64 entry of a manifest list, else the first one
fn select_platform_manifest(manifests: &[PlatformDescriptor]) -> Option<&str> {
    manifests
        .iter()
        .find(|m| {
            m.platform
                .as_ref()
                .map(|p| p.os == "linux" && p.architecture == "amd64")
                .unwrap_or(false)
        })
        .or_else(|| manifests.first())
        .map(|m| m.digest.as_str())
}

/// Read the release version label out of an image config blob
pub(crate) fn release_version_from_config(config: &[u8], image: &str) -> Result<String, LookupError> {
    let config: ImageConfig = serde_json::from_slice(config)
        .map_err(|e| LookupError::Registry(format!("invalid image config: {}", e)))?;

    config
        .config
        .and_then(|c| c.labels)
        .and_then(|mut labels| labels.remove(RELEASE_VERSION_LABEL))
        .filter(|version| !version.is_empty())
        .ok_or_else(|| LookupError::MissingVersionLabel(image.to_string()))
}

/// `ReleaseProvider` that talks to the image registry directly
pub struct RegistryReleaseProvider {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl Default for RegistryReleaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryReleaseProvider {
    pub fn new() -> Self {
        let client = match reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build registry HTTP client, using default");
                reqwest::Client::new()
            }
        };
        Self {
            client,
            base_url: None,
        }
    }

    /// Send registry API requests to `base_url` (e.g. `http://127.0.0.1:5000`)
    /// instead of `https://<registry host>`
    ///
    /// Credentials are still picked by the registry host of the image.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Per-lookup registry state: credentials and, once obtained, a bearer token
struct RegistrySession<'a> {
    client: &'a reqwest::Client,
    image: &'a ImageReference,
    base_url: String,
    basic: Option<String>,
    bearer: Option<String>,
}

impl RegistrySession<'_> {
    async fn send(&self, url: &str, accept: Option<&str>) -> Result<reqwest::Response, LookupError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        } else if let Some(basic) = &self.basic {
            request = request.header(AUTHORIZATION, format!("Basic {}", basic));
        }
        request
            .send()
            .await
            .map_err(|e| LookupError::Registry(format!("GET {} failed: {}", url, e)))
    }

    async fn get(&mut self, url: &str, accept: Option<&str>) -> Result<Vec<u8>, LookupError> {
        let mut response = self.send(url, accept).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.bearer.is_none() {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_bearer_challenge);
            if let Some(challenge) = challenge {
                self.bearer = Some(self.fetch_token(&challenge).await?);
                response = self.send(url, accept).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Registry(format!(
                "GET {} returned HTTP {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::Registry(format!("reading {} failed: {}", url, e)))?;
        Ok(body.to_vec())
    }

    async fn fetch_token(&self, challenge: &BearerChallenge) -> Result<String, LookupError> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", self.image.repository));

        let mut query = vec![("scope", scope)];
        if let Some(service) = &challenge.service {
            query.push(("service", service.clone()));
        }

        let mut request = self.client.get(&challenge.realm).query(&query);
        if let Some(basic) = &self.basic {
            request = request.header(AUTHORIZATION, format!("Basic {}", basic));
        }

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Registry(format!("token request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Registry(format!(
                "token request to {} returned HTTP {}",
                challenge.realm, status
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Registry(format!("invalid token response: {}", e)))?;
        token
            .token
            .or(token.access_token)
            .ok_or_else(|| LookupError::Registry("token response carries no token".to_string()))
    }

    async fn fetch_manifest(&mut self, reference: &str) -> Result<Manifest, LookupError> {
        let url = self.image.manifest_url(&self.base_url, reference);
        let body = self.get(&url, Some(MANIFEST_MEDIA_TYPES)).await?;
        serde_json::from_slice(&body)
            .map_err(|e| LookupError::Registry(format!("invalid manifest {}: {}", url, e)))
    }
}

#[async_trait]
impl ReleaseProvider for RegistryReleaseProvider {
    async fn lookup(&self, image: &str, pull_secret: &[u8]) -> Result<ReleaseImage, LookupError> {
        let reference = ImageReference::parse(image)?;
        let basic = registry_credentials(pull_secret, &reference.registry)?;

        let mut session = RegistrySession {
            client: &self.client,
            image: &reference,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| reference.base_url()),
            basic,
            bearer: None,
        };

        let mut manifest = session.fetch_manifest(&reference.reference).await?;
        if !manifest.manifests.is_empty() {
            let digest = select_platform_manifest(&manifest.manifests)
                .map(str::to_string)
                .ok_or_else(|| LookupError::Registry("empty manifest list".to_string()))?;
            debug!(image = %image, digest = %digest, "Following manifest list entry");
            manifest = session.fetch_manifest(&digest).await?;
        }

        let config_digest = manifest
            .config
            .ok_or_else(|| LookupError::Registry(format!("manifest of {} has no config", image)))?
            .digest;
        let blob_url = reference.blob_url(&session.base_url, &config_digest);
        let config = session.get(&blob_url, None).await?;

        let version = release_version_from_config(&config, image)?;
        debug!(image = %image, version = %version, "Resolved release image version");
        Ok(ReleaseImage::new(image, version))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "registry_test.rs"]
mod tests;
