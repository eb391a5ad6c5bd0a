use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::weather::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the database answers, "degraded" otherwise
    pub status: String,
    /// API version
    pub version: String,
    /// Whether the database is reachable
    pub database: bool,
    /// Whether live KMA weather is configured (otherwise generated weather is served)
    pub kma_configured: bool,
    /// Number of weather notice templates loaded at startup
    pub weather_templates: usize,
}

impl HealthResponse {
    fn new(db_ok: bool, kma_configured: bool, weather_templates: usize) -> Self {
        Self {
            status: if db_ok { "ok" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: db_ok,
            kma_configured,
            weather_templates,
        }
    }
}

/// Health check endpoint.
///
/// Always 200; an unreachable database is reported as status "degraded".
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    Json(HealthResponse::new(
        db_ok,
        state.kma_client.is_some(),
        state.catalog.len(),
    ))
}
