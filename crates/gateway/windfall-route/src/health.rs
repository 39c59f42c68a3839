//! Peer health tracking.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use windfall_types::{NodeHealth, NodeInfo};

/// How often the probe loop checks every peer.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks which peers answered their last health probe.
///
/// Absence of a record is treated as healthy. Only a probe that came
/// back negative removes a peer from the candidate set, so nodes are
/// routable before the first probe cycle and after a registry restart.
#[derive(Clone)]
pub struct HealthRegistry {
    statuses: Arc<RwLock<HashMap<String, NodeHealth>>>,
    http: reqwest::Client,
    port: u16,
}

impl HealthRegistry {
    /// `port` is the gateway port peers listen on; probes hit
    /// `http://{ip}:{port}/health`.
    pub fn new(port: u16) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self {
            statuses: Arc::new(RwLock::new(HashMap::new())),
            http,
            port,
        })
    }

    /// Probes one peer and records the result.
    pub async fn probe(&self, node: &NodeInfo) -> NodeHealth {
        let url = format!("http://{}:{}/health", node.ip, self.port);
        let started = Instant::now();
        let health = match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let latency = started.elapsed().as_millis() as u64;
                debug!(node = %node.id, latency_ms = latency, "peer healthy");
                NodeHealth::up(latency, now_ms())
            }
            Ok(response) => {
                warn!(node = %node.id, status = %response.status(), "peer unhealthy");
                NodeHealth::down(now_ms())
            }
            Err(err) => {
                warn!(node = %node.id, error = %err, "peer unreachable");
                NodeHealth::down(now_ms())
            }
        };
        self.record(&node.id, health.clone());
        health
    }

    /// Probes all peers concurrently.
    pub async fn probe_all(&self, nodes: &[NodeInfo]) {
        let probes = nodes.iter().map(|node| self.probe(node));
        futures::future::join_all(probes).await;
    }

    /// Stores a health record directly, bypassing the probe.
    pub fn record(&self, node_id: &str, health: NodeHealth) {
        self.write().insert(node_id.to_string(), health);
    }

    /// Peers that are not known to be down.
    pub fn healthy_candidates(&self, nodes: &[NodeInfo]) -> Vec<NodeInfo> {
        let statuses = self.read();
        nodes
            .iter()
            .filter(|node| statuses.get(&node.id).map_or(true, |h| h.healthy))
            .cloned()
            .collect()
    }

    /// Current health records, keyed by node id.
    pub fn snapshot(&self) -> HashMap<String, NodeHealth> {
        self.read().clone()
    }

    /// Probes every peer on an interval, forever.
    pub async fn run(&self, nodes: Vec<NodeInfo>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.probe_all(&nodes).await;
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, NodeHealth>> {
        self.statuses
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, NodeHealth>> {
        self.statuses
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
