use axum::{Json, Router, extract::State, routing::get};

use crate::models::{ApiOk, AppState};

#[derive(serde::Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

pub async fn root(State(state): State<AppState>) -> Json<ApiOk<ServiceInfo>> {
    Json(ApiOk {
        data: ServiceInfo {
            service: format!("{} API", state.clinic_name),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "operational".to_string(),
        },
    })
}

pub async fn health(State(state): State<AppState>) -> Json<ApiOk<ServiceInfo>> {
    // Cheap DB probe so load balancers notice a dead pool.
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    Json(ApiOk {
        data: ServiceInfo {
            service: format!("{} API", state.clinic_name),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: if db_ok { "healthy" } else { "degraded" }.to_string(),
        },
    })
}
