// [apps/server/src/handlers/ingestion.rs]
/*!
 * Agent-tagged routes (§4.7): report ingestion, command polling,
 * command acknowledgement, widget log intake. Every body here may
 * arrive as a plain JSON object or as an encrypted envelope — the
 * envelope is detected by the presence of `"encrypted": true` and
 * decrypted transparently before the handler ever sees the plaintext.
 */

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ApiError;
use crate::state::AppState;

/// Decodes a request body that may be a plain JSON value or an
/// encrypted envelope, returning the plaintext JSON either way.
fn open_envelope(config: &crate::config::Config, body: Value) -> Result<Value, ApiError> {
    let is_envelope = body
        .as_object()
        .map(|obj| obj.get("encrypted").and_then(Value::as_bool) == Some(true))
        .unwrap_or(false);

    if !is_envelope {
        return Ok(body);
    }

    let envelope: fleetops_crypto::EncryptedEnvelope = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("malformed envelope: {e}")))?;
    let plaintext = fleetops_crypto::decrypt(&config.encryption_key, &envelope)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    serde_json::from_slice(&plaintext).map_err(|e| ApiError::BadRequest(format!("decrypted body is not JSON: {e}")))
}

#[derive(Debug, Deserialize)]
struct ReportBody {
    machine_id: String,
    #[serde(default)]
    info: Value,
    #[serde(default)]
    metrics: Value,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    ok: bool,
    commands: Vec<fleetops_domain::Command>,
}

pub async fn report(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Result<Json<ReportResponse>, ApiError> {
    let plaintext = open_envelope(&state.config, body)?;
    let parsed: ReportBody =
        serde_json::from_value(plaintext).map_err(|e| ApiError::BadRequest(format!("malformed report body: {e}")))?;

    let commands = state.store.update(&parsed.machine_id, parsed.info, parsed.metrics);

    Ok(Json(ReportResponse { ok: true, commands }))
}

#[derive(Debug, Serialize)]
pub struct CommandsResponse {
    commands: Vec<fleetops_domain::Command>,
}

pub async fn poll_commands(
    State(state): State<Arc<AppState>>,
    Path(machine_id): Path<String>,
) -> Json<CommandsResponse> {
    Json(CommandsResponse { commands: state.store.deliver_pending(&machine_id) })
}

#[derive(Debug, Deserialize)]
struct AckBody {
    command_id: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Serialize)]
struct AckResponse {
    ok: bool,
}

pub async fn ack_command(
    State(state): State<Arc<AppState>>,
    Path(_machine_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<AckResponse>, ApiError> {
    let plaintext = open_envelope(&state.config, body)?;
    let parsed: AckBody =
        serde_json::from_value(plaintext).map_err(|e| ApiError::BadRequest(format!("malformed ack body: {e}")))?;

    state.store.ack_command(&parsed.command_id, parsed.result)?;
    Ok(Json(AckResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
struct WidgetLogBatch {
    #[serde(default)]
    entries: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct WidgetLogResponse {
    ok: bool,
    count: usize,
}

/// The widget's client-side log collection is out of scope (§1); the
/// server's only obligation is to accept the batch shape and report
/// how many entries it counted. No storage — there is nothing in
/// SPEC_FULL.md for these logs to be stored against.
pub async fn widget_logs(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<WidgetLogResponse>, ApiError> {
    let plaintext = open_envelope(&state.config, body)?;
    let parsed: WidgetLogBatch =
        serde_json::from_value(plaintext).map_err(|e| ApiError::BadRequest(format!("malformed log batch: {e}")))?;

    tracing::debug!(count = parsed.entries.len(), "received widget log batch");
    Ok(Json(WidgetLogResponse { ok: true, count: parsed.entries.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_envelope_passes_plain_bodies_through_unchanged() {
        let config = test_config();
        let body = serde_json::json!({"machine_id": "M1"});
        assert_eq!(open_envelope(&config, body.clone()).unwrap(), body);
    }

    #[test]
    fn open_envelope_decrypts_a_valid_envelope() {
        let config = test_config();
        let plaintext = serde_json::json!({"machine_id": "M1"});
        let envelope = fleetops_crypto::encrypt(&config.encryption_key, &serde_json::to_vec(&plaintext).unwrap()).unwrap();
        let body = serde_json::to_value(&envelope).unwrap();
        assert_eq!(open_envelope(&config, body).unwrap(), plaintext);
    }

    #[test]
    fn open_envelope_rejects_a_wrong_key() {
        let config = test_config();
        let plaintext = serde_json::json!({"machine_id": "M1"});
        let envelope = fleetops_crypto::encrypt(&[9u8; 32], &serde_json::to_vec(&plaintext).unwrap()).unwrap();
        let body = serde_json::to_value(&envelope).unwrap();
        assert!(open_envelope(&config, body).is_err());
    }

    fn test_config() -> crate::config::Config {
        crate::config::Config {
            port: 8768,
            tls: crate::config::TlsConfig::default(),
            api_key: "k".into(),
            encryption_key: vec![7u8; 32],
            db_encryption_key: None,
            history_size: 1000,
            session_ttl_seconds: 3600,
            online_window_seconds: 60,
            stale_window_seconds: 300,
            log_format: None,
            cluster_enabled: false,
            cluster_backend: crate::config::ClusterBackendKind::Memory,
            cluster_secret: Vec::new(),
            heartbeat_interval_seconds: 10,
            node_timeout_seconds: 30,
            kv: crate::config::KvSection::default(),
            cluster_file_path: "coordination.bin".into(),
            command_ttl_seconds: 3600,
            persistence_path: None,
            persistence_interval_seconds: 60,
            initial_admin_username: "admin".into(),
            initial_admin_password: "pw".into(),
            rate_limit_per_minute: 60,
        }
    }
}
