//! `GET /api/health` — liveness probe, no auth.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = match ctx.open_db() {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };

    Ok(Json(HealthResponse {
        status: "ok",
        version: config::APP_VERSION,
        database,
    }))
}
