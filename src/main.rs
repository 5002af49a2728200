mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod mailer;
mod models;
mod routes;
mod storage;

use crate::{config::Config, models::AppState};

use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;

    let state = AppState {
        db: pool,
        mailer: mailer::from_config(&cfg),
        session_ttl_hours: cfg.session_ttl_hours,
        magic_link_ttl_minutes: cfg.magic_link_ttl_minutes,
        frontend_url: cfg.frontend_url.clone(),
        public_base_url: cfg.public_base_url.clone(),
        media_dir: cfg.media_dir.clone(),
        clinic_name: cfg.clinic_name.clone(),
    };

    // DEV ONLY: allow browser clients (the booking SPA) to call the API.
    // This fixes OPTIONS preflight (CORS) that otherwise returns 405.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .nest_service("/media", ServeDir::new(&cfg.media_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
