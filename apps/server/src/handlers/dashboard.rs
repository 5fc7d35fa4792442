// [apps/server/src/handlers/dashboard.rs]
/*!
 * Dashboard-tagged read routes and the one dashboard write route
 * (`POST /api/fleet/command`), per §4.7.
 */

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MachinesResponse {
    machines: Vec<fleetops_domain::MachineSnapshot>,
}

pub async fn machines(State(state): State<Arc<AppState>>) -> Json<MachinesResponse> {
    Json(MachinesResponse { machines: state.store.list(state.status_windows()) })
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    total: usize,
    online: usize,
    stale: usize,
    offline: usize,
}

pub async fn summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let snapshots = state.store.list(state.status_windows());
    let mut response = SummaryResponse { total: snapshots.len(), online: 0, stale: 0, offline: 0 };
    for snapshot in &snapshots {
        match snapshot.status {
            fleetops_domain::MachineStatus::Online => response.online += 1,
            fleetops_domain::MachineStatus::Stale => response.stale += 1,
            fleetops_domain::MachineStatus::Offline => response.offline += 1,
        }
    }
    Json(response)
}

#[derive(Debug, Serialize)]
pub struct MachineResponse {
    machine: fleetops_domain::MachineSnapshot,
}

pub async fn machine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MachineResponse>, ApiError> {
    let machine = state.store.get(&id, state.status_windows()).ok_or_else(|| ApiError::NotFound(id.clone()))?;
    Ok(Json(MachineResponse { machine }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    entries: Vec<fleetops_domain::HistoryEntry>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let entries = state.store.history(&id, query.since).ok_or_else(|| ApiError::NotFound(id.clone()))?;
    Ok(Json(HistoryResponse { entries }))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommandBody {
    machine_id: String,
    action: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
pub struct CreateCommandResponse {
    command_id: String,
}

pub async fn create_command(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCommandBody>,
) -> Result<Json<CreateCommandResponse>, ApiError> {
    let command_id = state.store.enqueue_command(&body.machine_id, body.action, body.params)?;
    Ok(Json(CreateCommandResponse { command_id }))
}
