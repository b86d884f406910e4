//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The API surface is deliberately small: the websocket endpoint, three
//! auth endpoints, and a health check. Everything else is static files from
//! the site directory — except `teacher.html`, which is rewritten on the
//! way out to carry the caller's privilege flag (a boolean, never a secret).

pub mod auth;
pub mod ws;

use std::collections::HashMap;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::msg::now_ms;
use crate::services::access;
use crate::state::AppState;

/// Build the application router: API + websocket + static site fallback.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let site = ServeDir::new(&state.site_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/auth/status", get(auth::status))
        .route("/teacher.html", get(teacher_page))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .fallback_service(site)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// TEACHER PAGE
// =============================================================================

const PRIVILEGE_FLAG: &str = "window.__ROOMCAST_PRIVILEGED__";

/// `GET /teacher.html` — serve the teacher dashboard with the caller's
/// privilege flag injected. Only the boolean crosses the wire; the page is
/// public, the live feed behind it is not.
pub async fn teacher_page(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    jar: CookieJar,
) -> Response {
    let privileged = access::classify(
        &state.access,
        jar.get(auth::SESSION_COOKIE).map(Cookie::value),
        params.get("token").map(String::as_str),
        now_ms(),
    )
    .is_privileged();

    let path = state.site_dir.join("teacher.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(inject_privilege_flag(&html, privileged)).into_response(),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "teacher page not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Insert the privilege flag script at the end of `<head>`, or prepend it
/// when the document has no head element.
fn inject_privilege_flag(html: &str, privileged: bool) -> String {
    let script = format!("<script>{PRIVILEGE_FLAG} = {privileged};</script>");
    match html.find("</head>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..idx]);
            out.push_str(&script);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{script}{html}"),
    }
}
