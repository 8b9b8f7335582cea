//! Controller configuration from environment variables
//!
//! - `HCPSTATUS_NAMESPACE` (required): namespace of the HostedControlPlane
//! - `HCPSTATUS_HCP_NAME` (required): name of the HostedControlPlane
//! - `HCPSTATUS_HOSTED_KUBECONFIG`: kubeconfig for the hosted cluster;
//!   defaults to the in-cluster/ambient config
//! - `HCPSTATUS_HEALTH_PORT`: port for probes and metrics (default 8080)

use std::path::PathBuf;
use thiserror::Error;

pub const NAMESPACE_ENV: &str = "HCPSTATUS_NAMESPACE";
pub const HCP_NAME_ENV: &str = "HCPSTATUS_HCP_NAME";
pub const HOSTED_KUBECONFIG_ENV: &str = "HCPSTATUS_HOSTED_KUBECONFIG";
pub const HEALTH_PORT_ENV: &str = "HCPSTATUS_HEALTH_PORT";

pub const DEFAULT_HEALTH_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid port: {value}")]
    InvalidPort { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub namespace: String,
    pub hcp_name: String,
    pub hosted_kubeconfig: Option<PathBuf>,
    pub health_port: u16,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let namespace = get(NAMESPACE_ENV).ok_or(ConfigError::Missing(NAMESPACE_ENV))?;
        let hcp_name = get(HCP_NAME_ENV).ok_or(ConfigError::Missing(HCP_NAME_ENV))?;
        let hosted_kubeconfig = get(HOSTED_KUBECONFIG_ENV).map(PathBuf::from);
        let health_port = match get(HEALTH_PORT_ENV) {
            None => DEFAULT_HEALTH_PORT,
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort {
                    name: HEALTH_PORT_ENV,
                    value,
                })?,
        };

        Ok(Self {
            namespace,
            hcp_name,
            hosted_kubeconfig,
            health_port,
        })
    }
}
