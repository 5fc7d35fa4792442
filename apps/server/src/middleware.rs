// [apps/server/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: AUTH & REQUEST PIPELINE GUARDS (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: API-KEY, SESIÓN, CSRF Y LÍMITE DE TASA POR IP
 *
 * Generaliza la cadena de guardias del teacher (extracción de
 * identidad vía extensión de petición) en la cadena de cuatro pasos
 * de §4.6: clave de API para rutas `agent`, cookie de sesión para
 * rutas `dashboard`, CSRF para las que mutan estado, y límite de tasa
 * de token-bucket por IP en `/login` y las rutas `agent`.
 * =================================================================
 */

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::errors::ApiError;
use crate::state::AppState;

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub fn new_rate_limiter(per_minute: u32) -> Arc<IpRateLimiter> {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).expect("per_minute clamped to >= 1"));
    Arc::new(RateLimiter::keyed(quota))
}

/// The authenticated dashboard principal, injected by `session_guard`
/// and consumed by `csrf_guard` and any handler needing the caller's
/// identity or CSRF token.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub token: String,
    pub user_id: String,
    pub csrf_token: String,
}

/// Rejects requests whose source IP has exhausted its token bucket.
/// Applied to `/login` and the `agent`-tagged route group (§4.6 step 5).
pub async fn rate_limit_guard(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if state.limiter.check_key(&addr.ip()).is_err() {
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

/// API-key check for `agent`-tagged routes (§4.6 step 2): constant-time
/// compare of `X-API-Key` against the configured key.
pub async fn api_key_guard(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let provided = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok()).unwrap_or("");
    if !fleetops_crypto::constant_time_eq(provided.as_bytes(), state.config.api_key.as_bytes()) {
        return ApiError::Auth.into_response();
    }
    next.run(req).await
}

/// Session-cookie check for `dashboard`-tagged JSON routes (§4.6 step
/// 3). On success, extends the session's sliding TTL and injects the
/// resolved `SessionContext`.
pub async fn session_guard(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let Some(token) = jar.get("session").map(|c| c.value().to_string()) else {
        return ApiError::Auth.into_response();
    };

    let session = match state.sessions.resolve(&token).await {
        Ok(Some(session)) => session,
        Ok(None) => return ApiError::Auth.into_response(),
        Err(error) => return ApiError::from(error).into_response(),
    };

    if let Err(error) = state.sessions.extend(&token).await {
        return ApiError::from(error).into_response();
    }

    req.extensions_mut().insert(SessionContext {
        token,
        user_id: session.user_id,
        csrf_token: session.csrf_token,
    });

    next.run(req).await
}

/// CSRF check for state-changing dashboard routes (§4.6 step 4):
/// compares `X-CSRF-Token` against the session's token in constant
/// time. Must run after `session_guard` so `SessionContext` is present.
pub async fn csrf_guard(req: Request, next: Next) -> Response {
    let Some(session) = req.extensions().get::<SessionContext>().cloned() else {
        return ApiError::Auth.into_response();
    };
    let provided = req.headers().get("X-CSRF-Token").and_then(|v| v.to_str().ok()).unwrap_or("");

    if !fleetops_crypto::constant_time_eq(provided.as_bytes(), session.csrf_token.as_bytes()) {
        return ApiError::Csrf.into_response();
    }
    next.run(req).await
}
