use anyhow::Context as _;
use futures::StreamExt;
use hcpstatus::config::ControllerConfig;
use hcpstatus::controller::clock::SystemClock;
use hcpstatus::controller::release::{CachedReleaseProvider, RegistryReleaseProvider};
use hcpstatus::controller::store::{KubeClusterVersionSource, KubeControlPlaneStore};
use hcpstatus::controller::watch::{trigger_channel, watch_cluster_version};
use hcpstatus::controller::{error_policy, reconcile, Context};
use hcpstatus::crd::{ClusterVersion, HostedControlPlane};
use hcpstatus::server::{
    create_metrics, run_health_server, shutdown_channel, wait_for_signal, ReadinessState,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, Config};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Client for the hosted cluster: from a kubeconfig file if given, else the
/// management cluster client
async fn hosted_cluster_client(
    kubeconfig: Option<&Path>,
    management: &Client,
) -> anyhow::Result<Client> {
    let Some(path) = kubeconfig else {
        info!("No hosted kubeconfig configured, using the ambient client for ClusterVersion");
        return Ok(management.clone());
    };

    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("reading hosted kubeconfig {}", path.display()))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("loading hosted kubeconfig")?;
    info!(kubeconfig = %path.display(), "Connected to hosted cluster");
    Ok(Client::try_from(config)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // kube and reqwest both use rustls; pick the ring provider once
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ControllerConfig::from_env()?;
    info!(
        namespace = %config.namespace,
        name = %config.hcp_name,
        "Starting HostedControlPlane status controller"
    );

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let readiness = ReadinessState::new();
    let metrics = create_metrics().context("creating metrics registry")?;

    let health_handle = {
        let readiness = readiness.clone();
        let metrics = metrics.clone();
        let shutdown = shutdown_signal.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(port, readiness, metrics, shutdown).await {
                warn!(error = %e, "Health server failed");
            }
        })
    };

    let management = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };
    let hosted = hosted_cluster_client(config.hosted_kubeconfig.as_deref(), &management).await?;

    let ctx = Arc::new(Context::new(
        Arc::new(KubeControlPlaneStore::new(management.clone())),
        Arc::new(KubeClusterVersionSource::new(hosted.clone())),
        Arc::new(CachedReleaseProvider::new(RegistryReleaseProvider::new())),
        Arc::new(SystemClock),
        Some(metrics.clone()),
    ));

    let (trigger_tx, trigger_rx) = trigger_channel();
    let forward_handle = {
        let mut shutdown = shutdown_signal.clone();
        let cluster_versions = Api::<ClusterVersion>::all(hosted);
        tokio::spawn(async move {
            tokio::select! {
                _ = watch_cluster_version(cluster_versions, trigger_tx) => {}
                _ = shutdown.wait() => {}
            }
        })
    };

    let control_planes = Api::<HostedControlPlane>::namespaced(management, &config.namespace);
    let watch_config =
        watcher::Config::default().fields(&format!("metadata.name={}", config.hcp_name));

    readiness.set_ready();
    info!("Controller ready, starting reconciliation loop");

    // error_policy already logs failures
    let controller = Controller::new(control_planes, watch_config)
        .reconcile_all_on(trigger_rx)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Ok((object, _)) = res {
                info!(control_plane = %object, "Reconciled");
            }
        });

    tokio::select! {
        _ = controller => {
            info!("Controller stream ended");
        }
        signal = wait_for_signal() => {
            match signal {
                Ok(name) => info!(signal = name, "Initiating graceful shutdown"),
                Err(e) => error!(error = %e, "Failed to listen for termination signals, shutting down"),
            }
            readiness.set_not_ready();
        }
    }

    shutdown_controller.shutdown();

    info!("Stopping components...");
    if let Err(e) = forward_handle.await {
        warn!(error = %e, "ClusterVersion forwarder task failed");
    }
    if let Err(e) = health_handle.await {
        warn!(error = %e, "Health server task failed");
    }

    info!("HostedControlPlane status controller shut down");
    Ok(())
}
