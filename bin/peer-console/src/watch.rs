//! Poll loop reporting reachability changes

use registry_api::Peer;
use registry_core::PeerRegistry;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, PartialEq, Eq)]
pub enum Change {
    Appeared { name: String, online: bool },
    WentOnline(String),
    WentOffline(String),
    Disappeared(String),
}

/// Diff the previous pub_key -> online map against a fresh peer list
pub fn reachability_changes(previous: &HashMap<String, bool>, peers: &[Peer]) -> Vec<Change> {
    let mut changes = Vec::new();

    for peer in peers {
        let name = peer.display_name().to_string();
        match previous.get(&peer.pub_key) {
            None => changes.push(Change::Appeared {
                name,
                online: peer.is_online,
            }),
            Some(false) if peer.is_online => changes.push(Change::WentOnline(name)),
            Some(true) if !peer.is_online => changes.push(Change::WentOffline(name)),
            _ => {}
        }
    }

    for pub_key in previous.keys() {
        if !peers.iter().any(|p| &p.pub_key == pub_key) {
            changes.push(Change::Disappeared(pub_key.clone()));
        }
    }

    changes
}

/// Watch until Ctrl-C
pub async fn run(registry: &PeerRegistry, period: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_until(registry, period, ctrl_c).await;
}

/// Poll until `shutdown` completes. The shutdown future lives across
/// iterations, so it also interrupts a refresh in flight.
pub async fn run_until<F>(registry: &PeerRegistry, period: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    info!("Watching peer status every {:?}", period);

    let mut ticker = tokio::time::interval(period);
    let mut previous: HashMap<String, bool> = HashMap::new();
    let mut first = true;

    tokio::pin!(shutdown);

    loop {
        let refreshed = tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping watch");
                return;
            }
            result = async {
                ticker.tick().await;
                registry.refresh().await
            } => result,
        };

        let peers = match refreshed {
            Ok(peers) => peers,
            Err(e) if e.is_transient() => {
                warn!("Gateway unavailable, retrying next tick: {}", e);
                continue;
            }
            Err(e) => {
                error!("Error refreshing peer status: {}", e);
                continue;
            }
        };

        if !first {
            for change in reachability_changes(&previous, &peers) {
                match change {
                    Change::Appeared { name, online } => {
                        info!("Peer {} appeared ({})", name, if online { "online" } else { "offline" })
                    }
                    Change::WentOnline(name) => info!("Peer {} is online", name),
                    Change::WentOffline(name) => warn!("Peer {} went offline", name),
                    Change::Disappeared(key) => info!("Peer {} is gone", key),
                }
            }
        }
        first = false;

        let summary = registry.summary().await;
        info!(
            "{} peers: {} online, {} offline, {} protected",
            summary.total, summary.online, summary.offline, summary.protected
        );

        previous = peers
            .into_iter()
            .map(|p| (p.pub_key, p.is_online))
            .collect();
    }
}
