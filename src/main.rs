mod config;
mod msg;
mod routes;
mod services;
mod state;

use crate::services::access::AccessConfig;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env().expect("config init failed");

    let access = AccessConfig::new(&config.pin, config.legacy_token.clone());
    let state = state::AppState::new(access, config.site_dir.clone());

    // Spawn background staleness reaper.
    let _reaper = services::reaper::spawn_reaper_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, site_dir = %config.site_dir.display(), "roomcast listening");
    axum::serve(listener, app).await.expect("server failed");
}
