// [libs/domain/models/src/history.rs]
/*!
 * Una entrada de historia por máquina: (timestamp, metrics). La
 * marca temporal la asigna el servidor en el momento de ingesta, no
 * el agente; la secuencia por máquina está acotada en H entradas con
 * desalojo FIFO (enforced by the data store, not this type).
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub machine_id: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: Value,
}
