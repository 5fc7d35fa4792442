// [apps/server/src/handlers/auth.rs]
/*!
 * Login and logout (§4.7). Login is rate-limited and public; logout
 * is dashboard-tagged (requires an existing session) but needs no
 * CSRF check of its own in this router's layering — see `routes.rs`
 * for why.
 */

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::middleware::SessionContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    ok: bool,
    csrf_token: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let verified = {
        let mut users = state.users.lock().expect("user store lock poisoned");
        users.verify(&body.username, &body.password).map(|u| u.username.clone())
    };
    let username = verified.ok_or(ApiError::Auth)?;

    let (token, csrf_token) = state.sessions.create(&username).await?;

    let cookie = Cookie::build(("session", token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(true)
        .path("/")
        .max_age(time::Duration::seconds(state.config.session_ttl_seconds))
        .build();

    Ok((jar.add(cookie), Json(LoginResponse { ok: true, csrf_token })))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    ok: bool,
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: axum::Extension<SessionContext>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutResponse>), ApiError> {
    state.sessions.revoke(&session.token).await?;
    Ok((jar.remove(Cookie::from("session")), Json(LogoutResponse { ok: true })))
}
