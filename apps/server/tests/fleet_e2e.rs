// [apps/server/tests/fleet_e2e.rs]
/*!
 * =================================================================
 * APARATO: END-TO-END ROUTER CERTIFICATION (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: INTEGRATION STRATUM
 * RESPONSABILIDAD: EJERCITAR EL ENRUTADOR COMPLETO VÍA `tower::oneshot`
 *
 * Exercises `fleetops_server::routes::build_router` end to end,
 * in-process, with no real socket — the six scenarios of §8: basic
 * ingestion, the command round trip, status transitions across the
 * online/stale windows, encrypted-envelope ingestion, the session +
 * CSRF flow, and single-node cluster self-visibility. `ConnectInfo`
 * is inserted directly as a request extension rather than via
 * `into_make_service_with_connect_info`, since `oneshot` talks to the
 * `Router` directly and bypasses the make-service layer `kernel.rs`
 * uses for the real listener.
 * =================================================================
 */

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use fleetops_server::config::{ClusterBackendKind, Config, KvSection, TlsConfig};
use fleetops_server::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn peer() -> SocketAddr {
    "127.0.0.1:51000".parse().unwrap()
}

fn base_config() -> Config {
    Config {
        port: 8768,
        tls: TlsConfig::default(),
        api_key: "test-api-key".into(),
        encryption_key: vec![7u8; 32],
        db_encryption_key: None,
        history_size: 1000,
        session_ttl_seconds: 3600,
        online_window_seconds: 60,
        stale_window_seconds: 300,
        log_format: None,
        cluster_enabled: false,
        cluster_backend: ClusterBackendKind::Memory,
        cluster_secret: Vec::new(),
        heartbeat_interval_seconds: 10,
        node_timeout_seconds: 30,
        kv: KvSection::default(),
        cluster_file_path: "coordination.bin".into(),
        command_ttl_seconds: 3600,
        persistence_path: None,
        persistence_interval_seconds: 60,
        initial_admin_username: "admin".into(),
        initial_admin_password: "correct horse battery staple".into(),
        rate_limit_per_minute: 600,
    }
}

async fn router_with(config: Config) -> axum::Router {
    let state = AppState::bootstrap(config).await.expect("bootstrap should not fail in tests");
    fleetops_server::routes::build_router(Arc::new(state))
}

fn req(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(peer()))
        .body(Body::empty())
        .unwrap()
}

fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(peer()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Builds an agent-tagged request carrying the configured API key —
/// the common shape behind `/report`, `/commands/:id`, and the ack route.
fn agent_req(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(peer()))
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", "test-api-key")
        .body(body)
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pulls the opaque session-cookie value out of a `Set-Cookie` header,
/// the way a browser would before replaying it on the next request.
fn session_cookie(response: &axum::response::Response) -> String {
    let raw = response.headers().get(header::SET_COOKIE).expect("login must set a cookie").to_str().unwrap();
    let pair = raw.split(';').next().expect("cookie header is never empty");
    pair.trim().to_string()
}

// --- Scenario 1: basic ingestion shows up on the dashboard --------------

#[tokio::test]
async fn agent_report_makes_the_machine_visible_to_the_dashboard() {
    let app = router_with(base_config()).await;

    let body = submit_report(&app, "M1", json!({"hostname": "m1"}), json!({"cpu": 0.42})).await;
    assert_eq!(body["ok"], true);
    assert!(body["commands"].as_array().unwrap().is_empty());

    // A missing or wrong API key never reaches the store.
    let rejected = json_req("POST", "/api/fleet/report", json!({"machine_id": "M2"}));
    let response = app.clone().oneshot(rejected).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Authenticated dashboard session can now see the machine.
    let (cookie, _) = login(&app, "admin", "correct horse battery staple").await;
    let listing = app
        .clone()
        .oneshot(Request::builder().method("GET").uri("/api/fleet/machines").header(header::COOKIE, cookie).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(listing.status(), StatusCode::OK);
    let body = body_json(listing).await;
    let machines = body["machines"].as_array().unwrap();
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0]["machine_id"], "M1");
    assert_eq!(machines[0]["status"], "online");
}

// --- Scenario 2: command round trip --------------------------------------

#[tokio::test]
async fn a_command_is_queued_delivered_and_acknowledged_exactly_once() {
    let app = router_with(base_config()).await;

    // An agent has to exist before a command can target it.
    submit_report(&app, "M1", json!({}), json!({})).await;

    let (cookie, csrf) = login(&app, "admin", "correct horse battery staple").await;

    let create = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/fleet/command")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, cookie.clone())
                .header("X-CSRF-Token", csrf)
                .body(Body::from(json!({"machine_id": "M1", "action": "restart"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);
    let command_id = body_json(create).await["command_id"].as_str().unwrap().to_string();

    // Delivered on the agent's next report.
    let delivered = submit_report(&app, "M1", json!({}), json!({})).await;
    let commands = delivered["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["command_id"], command_id);
    assert_eq!(commands[0]["status"], "delivered");

    // First ack succeeds.
    let ack = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/api/fleet/command/M1/ack",
            json!({"command_id": command_id, "result": {"ok": true}}),
        ))
        .await
        .unwrap();
    assert_eq!(ack.status(), StatusCode::UNAUTHORIZED); // agent routes still require X-API-Key

    let ack_body = || Body::from(json!({"command_id": command_id, "result": {"ok": true}}).to_string());
    let ack = app.clone().oneshot(agent_req("POST", "/api/fleet/command/M1/ack", ack_body())).await.unwrap();
    assert_eq!(ack.status(), StatusCode::OK);

    // A second ack on the same command is rejected as not found.
    let second_ack = app.clone().oneshot(agent_req("POST", "/api/fleet/command/M1/ack", ack_body())).await.unwrap();
    assert_eq!(second_ack.status(), StatusCode::NOT_FOUND);
}

// --- Scenario 3: status transitions across the online/stale windows -----

#[tokio::test]
async fn machine_status_transitions_from_online_to_stale_to_offline() {
    let mut config = base_config();
    config.online_window_seconds = 0;
    config.stale_window_seconds = 1;
    let app = router_with(config).await;

    submit_report(&app, "M1", json!({}), json!({})).await;
    let (cookie, _) = login(&app, "admin", "correct horse battery staple").await;

    let status_of = |app: axum::Router, cookie: String| async move {
        let response = app
            .oneshot(Request::builder().method("GET").uri("/api/fleet/machine/M1").header(header::COOKIE, cookie).body(Body::empty()).unwrap())
            .await
            .unwrap();
        body_json(response).await["machine"]["status"].as_str().unwrap().to_string()
    };

    // online_window is 0s, so by the time this lands the machine has
    // already aged past "online" into "stale".
    assert_eq!(status_of(app.clone(), cookie.clone()).await, "stale");

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    assert_eq!(status_of(app.clone(), cookie).await, "offline");
}

// --- Scenario 4: encrypted payload ingestion -----------------------------

#[tokio::test]
async fn an_encrypted_report_decrypts_with_the_right_key_and_rejects_the_wrong_one() {
    let app = router_with(base_config()).await;
    let plaintext = json!({"machine_id": "M1", "info": {}, "metrics": {"cpu": 0.7}});
    let plaintext_bytes = serde_json::to_vec(&plaintext).unwrap();

    let envelope = fleetops_crypto::encrypt(&[7u8; 32], &plaintext_bytes).unwrap();
    let response = app
        .clone()
        .oneshot(agent_req("POST", "/api/fleet/report", Body::from(serde_json::to_vec(&envelope).unwrap())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let wrong_key_envelope = fleetops_crypto::encrypt(&[9u8; 32], &plaintext_bytes).unwrap();
    let response = app
        .clone()
        .oneshot(agent_req("POST", "/api/fleet/report", Body::from(serde_json::to_vec(&wrong_key_envelope).unwrap())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Scenario 5: session + CSRF flow -------------------------------------

#[tokio::test]
async fn dashboard_writes_require_a_session_cookie_and_a_matching_csrf_token() {
    let app = router_with(base_config()).await;
    submit_report(&app, "M1", json!({}), json!({})).await;

    // No cookie at all.
    let response = app
        .clone()
        .oneshot(json_req("POST", "/api/fleet/command", json!({"machine_id": "M1", "action": "noop"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (cookie, csrf) = login(&app, "admin", "correct horse battery staple").await;

    // Cookie present but no CSRF header.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/fleet/command")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, cookie.clone())
                .body(Body::from(json!({"machine_id": "M1", "action": "noop"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Cookie plus the matching CSRF token succeeds.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/fleet/command")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, cookie)
                .header("X-CSRF-Token", csrf)
                .body(Body::from(json!({"machine_id": "M1", "action": "noop"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Scenario 6: cluster self-visibility ---------------------------------

#[tokio::test]
async fn a_single_node_cluster_sees_its_own_health_and_status() {
    let mut config = base_config();
    config.cluster_enabled = true;
    config.cluster_secret = vec![1u8; 32];
    let app = router_with(config).await;

    let health = app.clone().oneshot(req("GET", "/api/fleet/cluster/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let body = body_json(health).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["node_id"].is_string());

    let (cookie, _) = login(&app, "admin", "correct horse battery staple").await;
    let status = app
        .oneshot(Request::builder().method("GET").uri("/api/fleet/cluster/status").header(header::COOKIE, cookie).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    let body = body_json(status).await;
    assert_eq!(body["backend"], "memory");
    let nodes = body["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0]["status"], "active");
}

// --- shared test helpers --------------------------------------------------

async fn login(app: &axum::Router, username: &str, password: &str) -> (String, String) {
    let response = app
        .clone()
        .oneshot(json_req("POST", "/login", json!({"username": username, "password": password})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let csrf = body_json(response).await["csrf_token"].as_str().unwrap().to_string();
    (cookie, csrf)
}

async fn submit_report(app: &axum::Router, machine_id: &str, info: Value, metrics: Value) -> Value {
    let body = Body::from(json!({"machine_id": machine_id, "info": info, "metrics": metrics}).to_string());
    let response = app.clone().oneshot(agent_req("POST", "/api/fleet/report", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}
