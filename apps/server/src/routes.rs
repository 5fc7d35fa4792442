// [apps/server/src/routes.rs]
/*!
 * =================================================================
 * APARATO: ROUTE TABLE (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ENSAMBLAJE DEL ENRUTADOR SEGÚN §4.7
 *
 * Generaliza la matriz de enrutamiento del teacher (CORS + capas de
 * guardia por grupo de rutas) al contrato de §4.7: un grupo `agent`
 * (clave de API + límite de tasa), un grupo `dashboard` de solo
 * lectura (sesión), un subconjunto `dashboard` que muta estado
 * (sesión + CSRF), y dos rutas públicas (`/login` con límite de tasa,
 * `/api/fleet/cluster/health`). `axum::Router::merge` compone
 * sub-routers construidos por separado precisamente porque las capas
 * se aplican antes del merge — así el CSRF guard cae solo sobre
 * `POST /api/fleet/command`, no sobre el resto del grupo dashboard.
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::http::{header, Method, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, BoxError, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, cluster, dashboard, ingestion};
use crate::middleware::{api_key_guard, csrf_guard, rate_limit_guard, session_guard};
use crate::state::AppState;

/// Hard per-request wall-clock deadline (§5): past this, the in-flight
/// handler is abandoned and the caller gets a 408 rather than a stuck
/// backend call holding the connection open indefinitely.
const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// `TimeoutLayer`'s elapsed error has to be turned back into a response
/// before it can sit under `Router::layer` — `HandleErrorLayer` is the
/// standard axum way to bridge a fallible `tower` layer into one.
async fn handle_deadline_elapsed(error: BoxError) -> (StatusCode, &'static str) {
    if error.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request exceeded the deadline")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "unhandled middleware error")
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, "X-API-Key".parse().unwrap(), "X-CSRF-Token".parse().unwrap()])
        .max_age(Duration::from_secs(3600));

    let agent_routes = Router::new()
        .route("/report", post(ingestion::report))
        .route("/commands/:machine_id", get(ingestion::poll_commands))
        .route("/command/:machine_id/ack", post(ingestion::ack_command))
        .route("/widget-logs", post(ingestion::widget_logs))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_guard))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_guard));

    let dashboard_writes = Router::new()
        .route("/command", post(dashboard::create_command))
        .layer(middleware::from_fn(csrf_guard));

    let dashboard_reads = Router::new()
        .route("/machines", get(dashboard::machines))
        .route("/summary", get(dashboard::summary))
        .route("/machine/:id", get(dashboard::machine))
        .route("/history/:id", get(dashboard::history))
        .route("/cluster/status", get(cluster::status));

    let dashboard_routes = dashboard_reads
        .merge(dashboard_writes)
        .layer(middleware::from_fn_with_state(state.clone(), session_guard));

    let fleet_routes = Router::new().nest("/api/fleet", agent_routes.merge(dashboard_routes));

    let login_route = Router::new()
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_guard));

    let logout_route = Router::new()
        .route("/logout", post(auth::logout))
        .layer(middleware::from_fn_with_state(state.clone(), session_guard));

    let public_routes = Router::new().route("/api/fleet/cluster/health", get(cluster::health));

    Router::new()
        .merge(fleet_routes)
        .merge(login_route)
        .merge(logout_route)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_deadline_elapsed))
                .layer(TimeoutLayer::new(REQUEST_DEADLINE)),
        )
        .layer(cors)
        .with_state(state)
}
