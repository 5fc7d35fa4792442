// [libs/domain/models/src/command.rs]
/*!
 * Un comando server-minted dirigido a una sola máquina. Las
 * transiciones de estado son monótonas: pending -> delivered ->
 * acknowledged, o cualquier estado -> expired; esta forma no impone
 * la transición, solo la describe — el almacén de datos es quien la
 * hace cumplir.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command's `result` payload is capped at this many bytes once
/// serialized; oversized results are rejected with 400 before they
/// reach storage (§9 open question, resolved in DESIGN.md).
pub const MAX_COMMAND_RESULT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Delivered,
    Acknowledged,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_id: String,
    pub machine_id: String,
    pub action: String,
    pub params: Value,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub status: CommandStatus,
}

impl Command {
    pub fn new_pending(command_id: String, machine_id: String, action: String, params: Value, created_at: DateTime<Utc>) -> Self {
        Self {
            command_id,
            machine_id,
            action,
            params,
            created_at,
            delivered_at: None,
            acknowledged_at: None,
            result: None,
            status: CommandStatus::Pending,
        }
    }
}
