//! Mirror a hosted cluster's ClusterVersion onto its HostedControlPlane status

pub mod config;
pub mod controller;
pub mod crd;
pub mod server;
