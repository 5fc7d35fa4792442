// [libs/domain/models/src/node.rs]
/*!
 * Un nodo del cluster: un proceso servidor que participa en la
 * membresía compartida. `signature` cubre (node_id, host, port,
 * issued_at) vía HMAC (ver `fleetops_crypto::sign_node_identity`);
 * este tipo solo transporta la forma, no la verifica.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Inactive,
}

/// The wire shape written under `fleet:cluster:` in the coordination
/// backend (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub issued_at: DateTime<Utc>,
    pub signature: String,
}

/// The read-only shape returned from `/api/fleet/cluster/status`,
/// with status resolved relative to the caller's node-timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub last_heartbeat: DateTime<Utc>,
    pub status: NodeStatus,
}
