// [apps/server/src/handlers/cluster.rs]
/*!
 * Cluster-visibility routes: authenticated status for the dashboard,
 * and the unauthenticated health probe load balancers poll (§4.7).
 */

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClusterStatusResponse {
    node_id: Option<String>,
    backend: &'static str,
    nodes: Vec<fleetops_domain::NodeSnapshot>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<ClusterStatusResponse>, ApiError> {
    let (node_id, nodes) = match &state.cluster {
        Some(manager) => (Some(manager.node_id().to_string()), manager.peers().await?),
        None => (None, Vec::new()),
    };

    let backend = match state.config.cluster_backend {
        crate::config::ClusterBackendKind::Memory => "memory",
        crate::config::ClusterBackendKind::File => "file",
        crate::config::ClusterBackendKind::Kv => "kv",
    };

    Ok(Json(ClusterStatusResponse { node_id, backend, nodes }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: Option<String>,
}

/// Bypasses authentication entirely (§4.7). Reports 503 when the
/// coordination backend cannot be reached, so a load balancer can
/// route around a node that has lost connectivity.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    if let Err(error) = state.backend.get("fleet:health:probe").await {
        tracing::warn!(%error, "health probe could not reach the coordination backend");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let node_id = state.cluster.as_ref().map(|m| m.node_id().to_string());
    Json(HealthResponse { status: "healthy", node_id }).into_response()
}
