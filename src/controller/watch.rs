//! Re-reconcile triggers from the hosted cluster
//!
//! The controller watches one HostedControlPlane in the management cluster,
//! but most of what it mirrors lives in ClusterVersion `version` on the
//! hosted cluster. Every change there is forwarded as a `()` into a channel
//! whose receiver feeds `Controller::reconcile_all_on`.

use crate::crd::{ClusterVersion, CLUSTER_VERSION_NAME};
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, ResourceExt};
use tracing::{debug, info, warn};

/// Channel carrying reconcile triggers to the controller
///
/// Buffer of 1: a trigger that is already queued covers any later change.
pub fn trigger_channel() -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
    mpsc::channel(1)
}

/// Queue a trigger without waiting
///
/// A full channel already holds a pending trigger and counts as delivered.
/// Returns false once the receiver is gone.
pub fn notify(tx: &mut mpsc::Sender<()>) -> bool {
    match tx.try_send(()) {
        Ok(()) => true,
        Err(e) if e.is_full() => true,
        Err(_) => false,
    }
}

/// Forward every ClusterVersion event in `events` as a trigger
///
/// Watch errors are logged; the watcher backs off and resumes on its own.
/// Ends when `events` ends or the receiver is dropped.
pub async fn forward_changes<S>(events: S, mut tx: mpsc::Sender<()>)
where
    S: Stream<Item = Result<ClusterVersion, watcher::Error>>,
{
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(cluster_version) => {
                debug!(
                    cluster_version = %cluster_version.name_any(),
                    resource_version = ?cluster_version.resource_version(),
                    "ClusterVersion changed"
                );
                if !notify(&mut tx) {
                    info!("Controller stopped, no longer forwarding ClusterVersion changes");
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "ClusterVersion watch error");
            }
        }
    }
}

/// Watch ClusterVersion `version` and forward its changes into `tx`
pub async fn watch_cluster_version(api: Api<ClusterVersion>, tx: mpsc::Sender<()>) {
    let config = watcher::Config::default().fields(&format!("metadata.name={}", CLUSTER_VERSION_NAME));
    let events = watcher(api, config).default_backoff().touched_objects();

    info!("Watching hosted cluster ClusterVersion");
    forward_changes(events, tx).await;
}
