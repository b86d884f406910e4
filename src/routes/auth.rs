//! Auth routes — PIN login, logout, and privilege status.
//!
//! DESIGN
//! ======
//! Login exchanges the shared teacher PIN for a signed session credential
//! carried in an http-only cookie. The cookie value is self-verifying (see
//! `services::access`), so these handlers stay stateless. A wrong PIN is a
//! 403 response, never a fault.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::Duration;
use tracing::{info, warn};

use crate::config::env_bool;
use crate::msg::now_ms;
use crate::services::access;
use crate::state::AppState;

/// Name of the session credential cookie.
pub(crate) const SESSION_COOKIE: &str = "roomcast_session";

pub(crate) fn cookie_secure() -> bool {
    env_bool("COOKIE_SECURE").unwrap_or(false)
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cookie_secure())
        .max_age(Duration::milliseconds(access::CREDENTIAL_TTL_MS))
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub pin: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/login` — verify the PIN and set the session cookie.
pub async fn login(State(state): State<AppState>, jar: CookieJar, Json(body): Json<LoginRequest>) -> Response {
    if !state.access.verify_pin(body.pin.trim()) {
        warn!("login rejected: wrong pin");
        return (
            StatusCode::FORBIDDEN,
            Json(LoginResponse { ok: false, error: Some("invalid pin".to_owned()) }),
        )
            .into_response();
    }

    let credential = access::issue_credential(&state.access, now_ms());
    let jar = jar.add(session_cookie(credential));
    info!("login accepted");
    (jar, Json(LoginResponse { ok: true, error: None })).into_response()
}

/// `POST /api/logout` — clear the session cookie.
pub async fn logout(jar: CookieJar) -> Response {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    (jar, Json(LoginResponse { ok: true, error: None })).into_response()
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub privileged: bool,
}

/// `GET /api/auth/status` — report whether the caller is currently
/// privileged, via the same gate the ws upgrade uses.
pub async fn status(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    jar: CookieJar,
) -> Json<StatusResponse> {
    let privileged = access::classify(
        &state.access,
        jar.get(SESSION_COOKIE).map(Cookie::value),
        params.get("token").map(String::as_str),
        now_ms(),
    )
    .is_privileged();
    Json(StatusResponse { privileged })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
