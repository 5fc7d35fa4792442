// [apps/server/src/state/store.rs]
/*!
 * =================================================================
 * APARATO: IN-MEMORY DATA STORE (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: REGISTRO DE MÁQUINAS, HISTORIA ACOTADA Y COMANDOS
 *
 * The machine registry, per-machine history, and command queue (§4.3).
 * Sharded per-machine locking (a `DashMap<String, RwLock<...>>`) keeps
 * reads of distinct machines from serializing, mirroring how the
 * teacher's swarm telemetry strata avoided one coarse mutex over the
 * whole fleet. Lock acquisition order is fixed per §5: the machine
 * registry lock is always released before the command map is touched,
 * so `update` never holds both at once.
 * =================================================================
 */

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fleetops_domain::{
    Command, CommandStatus, HistoryEntry, Machine, MachineSnapshot, MachineStatus,
    MAX_COMMAND_RESULT_BYTES,
};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown machine: {0}")]
    UnknownMachine(String),
    #[error("unknown or already-acknowledged command: {0}")]
    BadCommand(String),
    #[error("command result exceeds {MAX_COMMAND_RESULT_BYTES} bytes")]
    ResultTooLarge,
}

struct MachineRecord {
    machine: Machine,
    history: VecDeque<HistoryEntry>,
}

/// Thresholds used to derive `MachineStatus` at snapshot time.
#[derive(Debug, Clone, Copy)]
pub struct StatusWindows {
    pub online: chrono::Duration,
    pub stale: chrono::Duration,
}

/// Optional at-rest field encryption. `None` means plain storage.
pub struct AtRestKey(pub [u8; 32]);

fn seal(key: &Option<AtRestKey>, value: &Value) -> Value {
    let Some(key) = key else { return value.clone() };
    let plaintext = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(_) => return value.clone(),
    };
    match fleetops_crypto::encrypt(&key.0, &plaintext) {
        Ok(envelope) => serde_json::json!({
            "__sealed": true,
            "nonce": envelope.nonce,
            "ciphertext": envelope.ciphertext,
        }),
        Err(_) => value.clone(),
    }
}

fn unseal(key: &Option<AtRestKey>, value: &Value) -> Value {
    let Some(key) = key else { return value.clone() };
    let Some(obj) = value.as_object() else { return value.clone() };
    if obj.get("__sealed").and_then(Value::as_bool) != Some(true) {
        return value.clone();
    }
    let envelope = fleetops_crypto::EncryptedEnvelope {
        encrypted: true,
        version: fleetops_crypto::ENVELOPE_VERSION.to_string(),
        nonce: obj.get("nonce").and_then(Value::as_str).unwrap_or_default().to_string(),
        ciphertext: obj.get("ciphertext").and_then(Value::as_str).unwrap_or_default().to_string(),
    };
    match fleetops_crypto::decrypt(&key.0, &envelope) {
        Ok(plaintext) => serde_json::from_slice(&plaintext).unwrap_or(Value::Null),
        Err(error) => {
            tracing::warn!(%error, "at-rest decryption failed for a sealed field");
            Value::Null
        }
    }
}

/// The in-process machine registry, bounded history, and command
/// queue. One instance per node; peers never see each other's copy
/// directly (§4.3's "ownership" note) — only through the coordination
/// backend when cluster mode shares session/membership state.
pub struct DataStore {
    machines: DashMap<String, MachineRecord>,
    commands: DashMap<String, Command>,
    pending: DashMap<String, Mutex<VecDeque<String>>>,
    history_cap: usize,
    at_rest_key: Option<AtRestKey>,
}

impl DataStore {
    pub fn new(history_cap: usize, at_rest_key: Option<[u8; 32]>) -> Self {
        Self {
            machines: DashMap::new(),
            commands: DashMap::new(),
            pending: DashMap::new(),
            history_cap,
            at_rest_key: at_rest_key.map(AtRestKey),
        }
    }

    /// Upserts the machine record, appends one history entry (FIFO
    /// eviction past `history_cap`), and atomically returns the
    /// commands newly delivered to it — so the agent sees its queued
    /// work on the same round trip it reported on (§4.3).
    pub fn update(&self, machine_id: &str, info: Value, metrics: Value) -> Vec<Command> {
        let now = Utc::now();
        let sealed_info = seal(&self.at_rest_key, &info);
        let sealed_metrics = seal(&self.at_rest_key, &metrics);

        {
            let mut entry = self.machines.entry(machine_id.to_string()).or_insert_with(|| MachineRecord {
                machine: Machine {
                    machine_id: machine_id.to_string(),
                    info: sealed_info.clone(),
                    latest_metrics: sealed_metrics.clone(),
                    first_seen: now,
                    last_seen: now,
                },
                history: VecDeque::new(),
            });

            entry.machine.info = sealed_info;
            entry.machine.latest_metrics = sealed_metrics.clone();
            entry.machine.last_seen = now;

            entry.history.push_back(HistoryEntry { machine_id: machine_id.to_string(), timestamp: now, metrics: sealed_metrics });
            while entry.history.len() > self.history_cap {
                entry.history.pop_front();
            }
        }

        self.deliver_pending(machine_id)
    }

    /// A deep, decrypted snapshot. Mutating it never affects the
    /// store's own copy (§8's round-trip law).
    pub fn get(&self, machine_id: &str, windows: StatusWindows) -> Option<MachineSnapshot> {
        self.machines.get(machine_id).map(|entry| self.snapshot_of(&entry.machine, windows))
    }

    pub fn list(&self, windows: StatusWindows) -> Vec<MachineSnapshot> {
        self.machines.iter().map(|entry| self.snapshot_of(&entry.machine, windows)).collect()
    }

    fn snapshot_of(&self, machine: &Machine, windows: StatusWindows) -> MachineSnapshot {
        let now = Utc::now();
        MachineSnapshot {
            machine_id: machine.machine_id.clone(),
            info: unseal(&self.at_rest_key, &machine.info),
            latest_metrics: unseal(&self.at_rest_key, &machine.latest_metrics),
            first_seen: machine.first_seen,
            last_seen: machine.last_seen,
            status: MachineStatus::derive(machine.last_seen, now, windows.online, windows.stale),
        }
    }

    /// Entries with `timestamp > since`, oldest first. `since: None`
    /// returns the full retained tail.
    pub fn history(&self, machine_id: &str, since: Option<DateTime<Utc>>) -> Option<Vec<HistoryEntry>> {
        self.machines.get(machine_id).map(|entry| {
            entry
                .history
                .iter()
                .filter(|h| since.map(|s| h.timestamp > s).unwrap_or(true))
                .map(|h| HistoryEntry {
                    machine_id: h.machine_id.clone(),
                    timestamp: h.timestamp,
                    metrics: unseal(&self.at_rest_key, &h.metrics),
                })
                .collect()
        })
    }

    /// Mints a fresh command id, colliding ids are re-minted rather
    /// than surfaced (§4.7's "invisible to callers" conflict policy).
    pub fn enqueue_command(&self, machine_id: &str, action: String, params: Value) -> Result<String, StoreError> {
        if !self.machines.contains_key(machine_id) {
            return Err(StoreError::UnknownMachine(machine_id.to_string()));
        }

        let command_id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !self.commands.contains_key(&candidate) {
                break candidate;
            }
        };

        let command = Command::new_pending(
            command_id.clone(),
            machine_id.to_string(),
            action,
            seal(&self.at_rest_key, &params),
            Utc::now(),
        );
        self.commands.insert(command_id.clone(), command);
        self.pending
            .entry(machine_id.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()))
            .lock()
            .expect("pending queue lock poisoned")
            .push_back(command_id.clone());

        Ok(command_id)
    }

    /// Atomically drains every pending command for `machine_id`,
    /// transitioning each to `Delivered` and returning them in the
    /// insertion order they were enqueued (§5's per-machine ordering
    /// guarantee).
    pub fn deliver_pending(&self, machine_id: &str) -> Vec<Command> {
        let ids: Vec<String> = match self.pending.get(machine_id) {
            Some(queue) => {
                let mut guard = queue.lock().expect("pending queue lock poisoned");
                guard.drain(..).collect()
            }
            None => Vec::new(),
        };

        let now = Utc::now();
        ids.into_iter()
            .filter_map(|id| {
                self.commands.get_mut(&id).map(|mut command| {
                    command.status = CommandStatus::Delivered;
                    command.delivered_at = Some(now);
                    self.decrypted_copy(&command)
                })
            })
            .collect()
    }

    /// Marks a command acknowledged and stores its result. 404s (as
    /// `BadCommand`) for an unknown id or a second ack on the same
    /// command — acknowledgement is a one-way transition.
    pub fn ack_command(&self, command_id: &str, result: Value) -> Result<(), StoreError> {
        let serialized_len = serde_json::to_vec(&result).map(|b| b.len()).unwrap_or(0);
        if serialized_len > MAX_COMMAND_RESULT_BYTES {
            return Err(StoreError::ResultTooLarge);
        }

        let mut command = self.commands.get_mut(command_id).ok_or_else(|| StoreError::BadCommand(command_id.to_string()))?;
        if command.status == CommandStatus::Acknowledged {
            return Err(StoreError::BadCommand(command_id.to_string()));
        }
        command.status = CommandStatus::Acknowledged;
        command.acknowledged_at = Some(Utc::now());
        command.result = Some(seal(&self.at_rest_key, &result));
        Ok(())
    }

    fn decrypted_copy(&self, command: &Command) -> Command {
        Command {
            command_id: command.command_id.clone(),
            machine_id: command.machine_id.clone(),
            action: command.action.clone(),
            params: unseal(&self.at_rest_key, &command.params),
            created_at: command.created_at,
            delivered_at: command.delivered_at,
            acknowledged_at: command.acknowledged_at,
            result: command.result.as_ref().map(|r| unseal(&self.at_rest_key, r)),
            status: command.status,
        }
    }

    /// Sweeps commands that are still `Pending` or `Delivered` past
    /// `ttl` from `created_at` into `Expired`. Run on an interval by
    /// the background sweeper (§4.3 lifecycle, §5 background tasks).
    pub fn expire_overdue_commands(&self, ttl: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut expired = 0usize;
        for mut entry in self.commands.iter_mut() {
            let overdue = now - entry.created_at > ttl;
            let live = matches!(entry.status, CommandStatus::Pending | CommandStatus::Delivered);
            if overdue && live {
                entry.status = CommandStatus::Expired;
                expired += 1;
            }
        }
        expired
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    /// Read access for the snapshot persister (§10.3/§6 "Persisted
    /// state layout"); returns the sealed (still at-rest-encrypted)
    /// representation so the snapshot file inherits the same
    /// encryption the live store carries.
    pub fn sealed_snapshot(&self) -> (Vec<(String, Value, Value, DateTime<Utc>, DateTime<Utc>)>, Vec<Command>) {
        let machines = self
            .machines
            .iter()
            .map(|e| {
                (
                    e.machine.machine_id.clone(),
                    e.machine.info.clone(),
                    e.machine.latest_metrics.clone(),
                    e.machine.first_seen,
                    e.machine.last_seen,
                )
            })
            .collect();
        let commands = self.commands.iter().map(|e| e.value().clone()).collect();
        (machines, commands)
    }

    /// Restores machines (history is not part of the snapshot — only
    /// the latest metrics survive a restart, consistent with the
    /// snapshot shape in §6) and commands from a prior persisted
    /// snapshot, rebuilding the pending queue from any command still
    /// in `Pending` state.
    pub fn restore(&self, machines: Vec<(String, Value, Value, DateTime<Utc>, DateTime<Utc>)>, commands: Vec<Command>) {
        for (machine_id, info, latest_metrics, first_seen, last_seen) in machines {
            self.machines.insert(
                machine_id.clone(),
                MachineRecord {
                    machine: Machine { machine_id, info, latest_metrics, first_seen, last_seen },
                    history: VecDeque::new(),
                },
            );
        }
        for command in commands {
            let machine_id = command.machine_id.clone();
            let command_id = command.command_id.clone();
            let status = command.status;
            self.commands.insert(command_id.clone(), command);
            if status == CommandStatus::Pending {
                self.pending
                    .entry(machine_id)
                    .or_insert_with(|| Mutex::new(VecDeque::new()))
                    .lock()
                    .expect("pending queue lock poisoned")
                    .push_back(command_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn windows() -> StatusWindows {
        StatusWindows { online: chrono::Duration::seconds(60), stale: chrono::Duration::seconds(300) }
    }

    #[test]
    fn update_creates_and_then_updates_a_machine() {
        let store = DataStore::new(1000, None);
        store.update("M1", serde_json::json!({"hostname": "m1"}), serde_json::json!({"cpu": 0.1}));
        let snapshot = store.get("M1", windows()).unwrap();
        assert_eq!(snapshot.latest_metrics["cpu"], 0.1);

        store.update("M1", serde_json::json!({"hostname": "m1"}), serde_json::json!({"cpu": 0.9}));
        let snapshot = store.get("M1", windows()).unwrap();
        assert_eq!(snapshot.latest_metrics["cpu"], 0.9);
        assert_eq!(store.history("M1", None).unwrap().len(), 2);
    }

    #[test]
    fn history_is_capped_and_evicts_fifo() {
        let store = DataStore::new(3, None);
        for i in 0..5 {
            store.update("M1", serde_json::json!({}), serde_json::json!({"i": i}));
        }
        let history = store.history("M1", None).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].metrics["i"], 2);
        assert_eq!(history[2].metrics["i"], 4);
    }

    #[test]
    fn since_query_at_or_past_the_latest_timestamp_is_empty() {
        let store = DataStore::new(1000, None);
        store.update("M1", serde_json::json!({}), serde_json::json!({}));
        let latest = store.history("M1", None).unwrap().last().unwrap().timestamp;
        assert!(store.history("M1", Some(latest)).unwrap().is_empty());
    }

    #[test]
    fn command_lifecycle_round_trips_through_delivery_and_ack() {
        let store = DataStore::new(1000, None);
        store.update("M1", serde_json::json!({}), serde_json::json!({}));

        let command_id = store.enqueue_command("M1", "restart".into(), serde_json::json!({})).unwrap();
        let delivered = store.deliver_pending("M1");
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].command_id, command_id);
        assert_eq!(delivered[0].status, CommandStatus::Delivered);

        assert!(store.deliver_pending("M1").is_empty());

        store.ack_command(&command_id, serde_json::json!({"ok": true})).unwrap();
        assert!(matches!(store.ack_command(&command_id, serde_json::json!({})), Err(StoreError::BadCommand(_))));
    }

    #[test]
    fn enqueue_against_an_unknown_machine_fails() {
        let store = DataStore::new(1000, None);
        assert!(matches!(
            store.enqueue_command("ghost", "noop".into(), serde_json::json!({})),
            Err(StoreError::UnknownMachine(_))
        ));
    }

    #[test]
    fn oversized_results_are_rejected() {
        let store = DataStore::new(1000, None);
        store.update("M1", serde_json::json!({}), serde_json::json!({}));
        let command_id = store.enqueue_command("M1", "noop".into(), serde_json::json!({})).unwrap();
        store.deliver_pending("M1");

        let oversized = serde_json::json!({"blob": "x".repeat(MAX_COMMAND_RESULT_BYTES + 1)});
        assert!(matches!(store.ack_command(&command_id, oversized), Err(StoreError::ResultTooLarge)));
    }

    #[test]
    fn at_rest_encryption_round_trips_transparently() {
        let store = DataStore::new(1000, Some([3u8; 32]));
        store.update("M1", serde_json::json!({"hostname": "m1"}), serde_json::json!({"cpu": 0.5}));
        let snapshot = store.get("M1", windows()).unwrap();
        assert_eq!(snapshot.latest_metrics["cpu"], 0.5);
        assert_eq!(snapshot.info["hostname"], "m1");
    }

    #[test]
    fn expiry_sweeper_only_touches_overdue_undelivered_commands() {
        let store = DataStore::new(1000, None);
        store.update("M1", serde_json::json!({}), serde_json::json!({}));
        let command_id = store.enqueue_command("M1", "noop".into(), serde_json::json!({})).unwrap();

        assert_eq!(store.expire_overdue_commands(chrono::Duration::seconds(3600)), 0);
        assert_eq!(store.expire_overdue_commands(chrono::Duration::seconds(-1)), 1);
        assert_eq!(store.commands.get(&command_id).unwrap().status, CommandStatus::Expired);
    }

    proptest! {
        /// Whatever the cap and however many updates land, history never
        /// exceeds `history_cap` and always holds the most recent entries
        /// in order (§4.3's bounded-FIFO invariant).
        #[test]
        fn history_never_exceeds_its_cap(cap in 1usize..20, updates in 0usize..50) {
            let store = DataStore::new(cap, None);
            for i in 0..updates {
                store.update("M1", serde_json::json!({}), serde_json::json!({"i": i}));
            }
            let history = store.history("M1", None).unwrap_or_default();
            prop_assert!(history.len() <= cap);
            prop_assert!(history.len() <= updates);
            if !history.is_empty() {
                let expected_last = updates - 1;
                prop_assert_eq!(history.last().unwrap().metrics["i"], expected_last);
            }
        }
    }
}
