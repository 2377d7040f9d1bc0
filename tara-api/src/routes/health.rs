use axum::Json;
use tara_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("tara-api", env!("CARGO_PKG_VERSION")))
}
