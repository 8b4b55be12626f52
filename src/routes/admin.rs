//! Dev/admin HTTP endpoints.
//!
//! Gated behind `AppConfig::dev_mode` at the router level (see `main.rs`) —
//! these mutate shared state and are not meant to be reachable in production.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::queries;
use crate::errors::{AppError, ErrorResponse};
use crate::scheduler::SchedulerState;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetDbResponse {
    pub locations_cleared: bool,
    pub cache_flushed: bool,
}

/// Wipe every location (cascading to aliases and weather/forecast rows) and
/// flush the cache. Intended for integration tests that need a clean slate.
#[utoipa::path(
    post,
    path = "/dev/reset-db",
    tag = "Admin",
    responses(
        (status = 200, description = "Database and cache reset", body = ResetDbResponse),
        (status = 500, description = "Reset failed", body = ErrorResponse),
    )
)]
pub async fn reset_db(State(state): State<AppState>) -> Result<Json<ResetDbResponse>, AppError> {
    queries::delete_all_locations(&state.pool).await?;
    state.cache.flush_all().await?;

    Ok(Json(ResetDbResponse {
        locations_cleared: true,
        cache_flushed: true,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunSchedulerJobsResponse {
    pub triggered: bool,
}

/// Force one immediate pass of all three refresh jobs ("manual
/// trigger"). A kind whose periodic job is already mid-tick is skipped for
/// this pass rather than queued. Returns 202 without waiting for the pass
/// to complete.
#[utoipa::path(
    post,
    path = "/dev/run-scheduler-jobs",
    tag = "Admin",
    responses(
        (status = 202, description = "Scheduler jobs triggered", body = RunSchedulerJobsResponse),
    )
)]
pub async fn run_scheduler_jobs(
    State(state): State<AppState>,
) -> (StatusCode, Json<RunSchedulerJobsResponse>) {
    let handles = state.scheduler_handles.clone();
    tokio::spawn(async move { handles.trigger_all().await });
    (
        StatusCode::ACCEPTED,
        Json(RunSchedulerJobsResponse { triggered: true }),
    )
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub provider_ids: Vec<String>,
    pub dev_mode: bool,
    pub scheduler: SchedulerState,
    pub current_interval_secs: u64,
    pub hourly_interval_secs: u64,
    pub daily_interval_secs: u64,
}

/// Current effective configuration and scheduler status, for debugging.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "Admin",
    responses(
        (status = 200, description = "Effective configuration", body = ConfigResponse),
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let scheduler = state.scheduler_state.read().await.clone();
    Json(ConfigResponse {
        provider_ids: state.providers.iter().map(|p| p.id().to_string()).collect(),
        dev_mode: state.config.dev_mode,
        scheduler,
        current_interval_secs: state.config.current.scheduler_interval.as_secs(),
        hourly_interval_secs: state.config.hourly.scheduler_interval.as_secs(),
        daily_interval_secs: state.config.daily.scheduler_interval.as_secs(),
    })
}
