// [apps/server/src/state/cluster.rs]
/*!
 * =================================================================
 * APARATO: CLUSTER MEMBERSHIP MANAGER (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: REGISTRO DE NODO, LATIDOS FIRMADOS Y ENUMERACIÓN DE PARES
 *
 * Any node may accept any request — there is no leader election in
 * the core (§4.4). Each node periodically rewrites its own signed
 * heartbeat into the coordination backend under `fleet:cluster:`;
 * peer enumeration lists that prefix, verifies every signature, and
 * derives active/inactive from how stale each record's heartbeat is.
 * Node self-registration is the one place the core uses
 * compare-and-set, to detect a concurrent node-id collision.
 * =================================================================
 */

use std::time::Duration;

use chrono::Utc;
use fleetops_coordination::CoordinationBackend;
use fleetops_domain::{NodeRecord, NodeSnapshot, NodeStatus};
use std::sync::Arc;
use uuid::Uuid;

pub const CLUSTER_KEY_PREFIX: &str = "fleet:cluster:";

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error(transparent)]
    Coordination(#[from] fleetops_coordination::CoordinationError),
    #[error("could not claim a unique node id after {0} attempts")]
    NodeIdCollision(u32),
}

pub struct ClusterManager {
    backend: Arc<dyn CoordinationBackend>,
    node_id: String,
    host: String,
    port: u16,
    secret: Vec<u8>,
    heartbeat_interval: Duration,
    node_timeout: chrono::Duration,
}

impl ClusterManager {
    /// Claims a node id via compare-and-set, retrying with a fresh
    /// suffix on collision (§4.2's sole use of CAS).
    pub async fn register(
        backend: Arc<dyn CoordinationBackend>,
        host: String,
        port: u16,
        secret: Vec<u8>,
        heartbeat_interval: Duration,
        node_timeout_seconds: i64,
    ) -> Result<Self, ClusterError> {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "node".to_string());

        for attempt in 0..5u32 {
            let candidate_id = format!("{hostname}-{}", &Uuid::new_v4().to_string()[..8]);

            let record = Self::build_record(&candidate_id, &host, port, &secret)?;
            let key = format!("{CLUSTER_KEY_PREFIX}{candidate_id}");
            let payload = serde_json::to_vec(&record).expect("NodeRecord is always serializable");

            let claimed = backend
                .compare_and_set(&key, None, payload, Some(heartbeat_interval * 3))
                .await?;

            if claimed {
                tracing::info!(node_id = %candidate_id, %host, port, "cluster node registered");
                return Ok(Self {
                    backend,
                    node_id: candidate_id,
                    host,
                    port,
                    secret,
                    heartbeat_interval,
                    node_timeout: chrono::Duration::seconds(node_timeout_seconds),
                });
            }
            tracing::warn!(candidate = %candidate_id, attempt, "node id collision on self-registration, retrying");
        }

        Err(ClusterError::NodeIdCollision(5))
    }

    fn build_record(node_id: &str, host: &str, port: u16, secret: &[u8]) -> Result<NodeRecord, ClusterError> {
        let issued_at = Utc::now();
        let signature = fleetops_crypto::sign_node_identity(secret, node_id, host, port, &issued_at)
            .map_err(|e| ClusterError::Coordination(fleetops_coordination::CoordinationError::Serialization(e.to_string())))?;
        Ok(NodeRecord { node_id: node_id.to_string(), host: host.to_string(), port, issued_at, signature })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Rewrites this node's own record with a fresh signature and TTL.
    /// Called on every heartbeat tick by the background heartbeat
    /// writer (§4.4).
    pub async fn heartbeat(&self) -> Result<(), ClusterError> {
        let record = Self::build_record(&self.node_id, &self.host, self.port, &self.secret)?;
        let key = format!("{CLUSTER_KEY_PREFIX}{}", self.node_id);
        let payload = serde_json::to_vec(&record).expect("NodeRecord is always serializable");
        self.backend.put(&key, payload, Some(self.heartbeat_interval * 3)).await?;
        Ok(())
    }

    /// Deletes this node's own record. Called on graceful shutdown; an
    /// abrupt death just lets the TTL expire it (§4.4).
    pub async fn deregister(&self) -> Result<(), ClusterError> {
        let key = format!("{CLUSTER_KEY_PREFIX}{}", self.node_id);
        self.backend.delete(&key).await?;
        Ok(())
    }

    /// Lists every node record under the cluster prefix, verifying
    /// signatures and clock skew, and derives active/inactive status
    /// relative to `node_timeout`. A record that fails verification is
    /// dropped rather than surfaced — a forged or replayed record is
    /// not a peer.
    pub async fn peers(&self) -> Result<Vec<NodeSnapshot>, ClusterError> {
        let records = self.backend.list(CLUSTER_KEY_PREFIX).await?;
        let now = Utc::now();
        let mut snapshots = Vec::with_capacity(records.len());

        for (key, record) in records {
            let parsed: NodeRecord = match serde_json::from_slice(&record.value) {
                Ok(parsed) => parsed,
                Err(error) => {
                    tracing::warn!(%key, %error, "dropping malformed cluster record");
                    continue;
                }
            };

            if fleetops_crypto::verify_node_identity(
                &self.secret,
                &parsed.node_id,
                &parsed.host,
                parsed.port,
                &parsed.issued_at,
                &parsed.signature,
            )
            .is_err()
            {
                tracing::warn!(node_id = %parsed.node_id, "dropping cluster record with invalid or stale signature");
                continue;
            }

            let status = if now - parsed.issued_at <= self.node_timeout {
                NodeStatus::Active
            } else {
                NodeStatus::Inactive
            };

            snapshots.push(NodeSnapshot {
                node_id: parsed.node_id,
                host: parsed.host,
                port: parsed.port,
                last_heartbeat: parsed.issued_at,
                status,
            });
        }

        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetops_coordination::InMemoryBackend;

    #[tokio::test]
    async fn registration_and_peer_listing_round_trips() {
        let backend: Arc<dyn CoordinationBackend> = Arc::new(InMemoryBackend::new());
        let manager = ClusterManager::register(
            backend,
            "10.0.0.1".into(),
            8768,
            b"cluster-secret".to_vec(),
            Duration::from_secs(10),
            30,
        )
        .await
        .unwrap();

        let peers = manager.peers().await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].status, NodeStatus::Active);
    }

    #[tokio::test]
    async fn a_peer_with_a_tampered_signature_is_dropped() {
        let backend = Arc::new(InMemoryBackend::new());
        let dyn_backend: Arc<dyn CoordinationBackend> = backend.clone();
        let manager = ClusterManager::register(
            dyn_backend,
            "10.0.0.1".into(),
            8768,
            b"cluster-secret".to_vec(),
            Duration::from_secs(10),
            30,
        )
        .await
        .unwrap();

        let key = format!("{CLUSTER_KEY_PREFIX}{}", manager.node_id());
        let mut record: NodeRecord = serde_json::from_slice(&backend.get(&key).await.unwrap().unwrap().value).unwrap();
        record.host = "evil.example".into();
        backend.put(&key, serde_json::to_vec(&record).unwrap(), None).await.unwrap();

        assert!(manager.peers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_peer_goes_inactive_once_its_heartbeat_outlives_node_timeout() {
        let backend: Arc<dyn CoordinationBackend> = Arc::new(InMemoryBackend::new());
        let manager = ClusterManager::register(
            backend,
            "10.0.0.1".into(),
            8768,
            b"cluster-secret".to_vec(),
            Duration::from_secs(10),
            1,
        )
        .await
        .unwrap();

        assert_eq!(manager.peers().await.unwrap()[0].status, NodeStatus::Active);

        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(manager.peers().await.unwrap()[0].status, NodeStatus::Inactive);
    }
}
