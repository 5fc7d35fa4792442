// [libs/domain/models/src/machine.rs]
/*!
 * La entidad central del registro de flota. `info` y `metrics` son
 * mapas opacos al núcleo (§3): el servidor nunca interpreta su
 * contenido, solo lo almacena, lo devuelve y, cuando hay una llave de
 * cifrado en reposo configurada, lo cifra campo a campo.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Derived, never stored independently — computed at snapshot time
/// from `last_seen` against the configured online/stale windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Stale,
    Offline,
}

impl MachineStatus {
    pub fn derive(last_seen: DateTime<Utc>, now: DateTime<Utc>, online_window: chrono::Duration, stale_window: chrono::Duration) -> Self {
        let age = now - last_seen;
        if age <= online_window {
            MachineStatus::Online
        } else if age <= stale_window {
            MachineStatus::Stale
        } else {
            MachineStatus::Offline
        }
    }
}

/// The authoritative, server-owned record of one agent. Never
/// serialized to the wire directly — callers always see a
/// `MachineSnapshot` with `status` computed as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: String,
    pub info: Value,
    pub latest_metrics: Value,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// The read-only shape returned to dashboard callers: a deep copy
/// with status resolved to a string, per §4.7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub machine_id: String,
    pub info: Value,
    pub latest_metrics: Value,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: MachineStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_derivation_respects_the_configured_windows() {
        let now = Utc::now();
        let online = chrono::Duration::seconds(60);
        let stale = chrono::Duration::seconds(300);

        assert_eq!(MachineStatus::derive(now, now, online, stale), MachineStatus::Online);
        assert_eq!(
            MachineStatus::derive(now - chrono::Duration::seconds(90), now, online, stale),
            MachineStatus::Stale
        );
        assert_eq!(
            MachineStatus::derive(now - chrono::Duration::seconds(400), now, online, stale),
            MachineStatus::Offline
        );
    }
}
