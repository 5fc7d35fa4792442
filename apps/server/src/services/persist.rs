// [apps/server/src/services/persist.rs]
/*!
 * Snapshot persistence (§6 "Persisted state layout", §10.3). Writes
 * the sealed (still at-rest-encrypted where configured) machine
 * registry and command queue to a single JSON file on an interval and
 * on graceful shutdown; reloaded once at startup via `load_snapshot`.
 * History is intentionally not part of the snapshot — only the
 * latest metrics survive a restart, matching `DataStore::restore`.
 */

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetops_domain::Command;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::store::DataStore;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct MachineRecord {
    machine_id: String,
    info: Value,
    latest_metrics: Value,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    schema_version: u32,
    machines: Vec<MachineRecord>,
    commands: Vec<Command>,
    saved_at: DateTime<Utc>,
}

/// Loads `path` into `store` if it exists. A missing file is not an
/// error — it just means this node has never persisted before.
pub fn load_snapshot(path: &Path, store: &DataStore) -> anyhow::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = std::fs::read(path)?;
    let snapshot: PersistedSnapshot = serde_json::from_slice(&raw)?;
    if snapshot.schema_version != SCHEMA_VERSION {
        anyhow::bail!("unsupported persisted snapshot schema version {}", snapshot.schema_version);
    }

    let machines = snapshot
        .machines
        .into_iter()
        .map(|m| (m.machine_id, m.info, m.latest_metrics, m.first_seen, m.last_seen))
        .collect();
    store.restore(machines, snapshot.commands);
    tracing::info!(path = %path.display(), "restored persisted snapshot");
    Ok(())
}

pub fn save_snapshot(path: &Path, store: &DataStore) -> anyhow::Result<()> {
    let (machines, commands) = store.sealed_snapshot();
    let snapshot = PersistedSnapshot {
        schema_version: SCHEMA_VERSION,
        machines: machines
            .into_iter()
            .map(|(machine_id, info, latest_metrics, first_seen, last_seen)| MachineRecord {
                machine_id,
                info,
                latest_metrics,
                first_seen,
                last_seen,
            })
            .collect(),
        commands,
        saved_at: Utc::now(),
    };

    let payload = serde_json::to_vec_pretty(&snapshot)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, payload)?;
    Ok(())
}

/// Periodic flush daemon. Runs until the process exits; the final
/// flush on graceful shutdown is a separate, explicit call from
/// `kernel::shutdown_signal` rather than relying on this loop's tick.
pub async fn spawn_persister(store: Arc<DataStore>, path: std::path::PathBuf, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(error) = save_snapshot(&path, &store) {
            tracing::error!(%error, path = %path.display(), "periodic snapshot persistence failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_saved_snapshot_restores_into_a_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let original = DataStore::new(1000, None);
        original.update("M1", serde_json::json!({"hostname": "m1"}), serde_json::json!({"cpu": 0.5}));
        save_snapshot(&path, &original).unwrap();

        let restored = DataStore::new(1000, None);
        load_snapshot(&path, &restored).unwrap();

        let windows = crate::state::store::StatusWindows {
            online: chrono::Duration::seconds(60),
            stale: chrono::Duration::seconds(300),
        };
        let snapshot = restored.get("M1", windows).unwrap();
        assert_eq!(snapshot.latest_metrics["cpu"], 0.5);
    }

    #[test]
    fn loading_a_missing_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let store = DataStore::new(1000, None);
        assert!(load_snapshot(&path, &store).is_ok());
    }
}
