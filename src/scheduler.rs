//! Refresh scheduler: three independent periodic jobs, one per forecast
//! kind, each an Idle⇄Running state machine. Sleeps for the kind's
//! `scheduler_interval`, skips the tick entirely if the previous one is
//! still running, otherwise replaces every known location's data: deletes
//! the kind's existing rows, fans out to providers directly, upserts the
//! result, and repopulates the cache. This is deliberately not the same
//! path `tiered_fetch` takes for HTTP requests — a tick must always reach
//! the providers, where `tiered_fetch` would just hand back whatever the
//! cache or record store already holds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::aggregation::{
    current::CurrentKind, daily::DailyKind, hourly::HourlyKind, populate_cache, AggregationContext,
    ForecastKind,
};
use crate::cache::{cache_key, CacheAdapter};
use crate::config::AppConfig;
use crate::db::models::Location;
use crate::db::queries;
use crate::providers::ProviderClient;

/// Status of one kind's refresh job, exposed via the config/status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStatus {
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_duration_ms: Option<u64>,
    pub last_run_locations: usize,
    pub total_runs: u64,
}

impl JobStatus {
    fn new() -> Self {
        Self {
            running: false,
            last_run_at: None,
            last_run_duration_ms: None,
            last_run_locations: 0,
            total_runs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerState {
    pub current: JobStatus,
    pub hourly: JobStatus,
    pub daily: JobStatus,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            current: JobStatus::new(),
            hourly: JobStatus::new(),
            daily: JobStatus::new(),
        }
    }
}

pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Shared dependencies every refresh job needs. Cheap to clone — every field
/// is itself a handle (`PgPool`, `CacheAdapter`) or reference-counted.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub pool: PgPool,
    pub cache: CacheAdapter,
    pub providers: Vec<ProviderClient>,
    pub config: AppConfig,
}

/// Run one kind's periodic refresh loop. Never returns; spawn with
/// `tokio::spawn`. `running` guards against a tick starting while the
/// previous one (or a manual trigger) is still in flight — it never queues,
/// it skips ("skip-if-running").
pub async fn run_refresh_job<K: ForecastKind>(
    deps: SchedulerDeps,
    interval: Duration,
    running: Arc<AtomicBool>,
    state: SharedSchedulerState,
    status_field: fn(&mut SchedulerState) -> &mut JobStatus,
) {
    tracing::info!(kind = K::NAME, interval_secs = interval.as_secs(), "refresh job started");
    loop {
        tokio::time::sleep(interval).await;

        if running.swap(true, Ordering::SeqCst) {
            tracing::debug!(kind = K::NAME, "tick skipped, previous run still in progress");
            continue;
        }

        run_one_tick::<K>(&deps, &state, status_field).await;
        running.store(false, Ordering::SeqCst);
    }
}

/// Delete-then-fan-out-then-upsert for one location, wholly replacing its
/// stored rows for kind `K`. Errors are logged and swallowed — one
/// location's failure must not stop the rest of the tick.
async fn refresh_one_location<K: ForecastKind>(ctx: &AggregationContext<'_>, location: &Location) {
    if let Err(e) = K::delete_store(ctx.pool, location.id).await {
        tracing::warn!(
            kind = K::NAME,
            location = %location.id,
            error = %e,
            "failed to clear existing rows before refresh"
        );
        return;
    }

    let (records, timezone_hint) = K::fan_out(ctx.providers, location).await;

    if records.is_empty() {
        tracing::warn!(
            kind = K::NAME,
            location = %location.id,
            "every provider failed during scheduled refresh, location left empty"
        );
        return;
    }

    if let Some(hint) = timezone_hint {
        if location.timezone.as_deref() != Some(hint.as_str()) {
            if let Err(e) = queries::update_location_timezone(ctx.pool, location.id, &hint).await
            {
                tracing::warn!(error = %e, "failed to persist timezone hint");
            }
        }
    }

    if let Err(e) = K::write_store(ctx.pool, location.id, &records).await {
        tracing::warn!(
            kind = K::NAME,
            location = %location.id,
            error = %e,
            "failed to persist scheduled refresh"
        );
        return;
    }

    let timing = K::timing(ctx.config);
    let key = cache_key(K::CACHE_PREFIX, location.id);
    populate_cache::<K>(ctx, &key, &records, timing.kv_ttl).await;
}

async fn run_one_tick<K: ForecastKind>(
    deps: &SchedulerDeps,
    state: &SharedSchedulerState,
    status_field: fn(&mut SchedulerState) -> &mut JobStatus,
) {
    let started = Utc::now();
    {
        let mut s = state.write().await;
        status_field(&mut s).running = true;
    }

    let locations = match queries::list_locations(&deps.pool).await {
        Ok(locs) => locs,
        Err(e) => {
            tracing::error!(kind = K::NAME, error = %e, "failed to list locations for refresh");
            let mut s = state.write().await;
            status_field(&mut s).running = false;
            return;
        }
    };

    let ctx = AggregationContext {
        pool: &deps.pool,
        cache: &deps.cache,
        providers: &deps.providers,
        config: &deps.config,
    };

    join_all(
        locations
            .iter()
            .map(|location| refresh_one_location::<K>(&ctx, location)),
    )
    .await;

    let duration_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;
    let mut s = state.write().await;
    let status = status_field(&mut s);
    status.running = false;
    status.last_run_at = Some(started);
    status.last_run_duration_ms = Some(duration_ms);
    status.last_run_locations = locations.len();
    status.total_runs += 1;

    tracing::info!(
        kind = K::NAME,
        locations = locations.len(),
        duration_ms,
        "refresh tick complete"
    );
}

/// Spawn all three refresh jobs, returning the running-flags a manual
/// trigger needs to force an immediate pass.
pub fn spawn_jobs(deps: SchedulerDeps, state: SharedSchedulerState) -> ManualTriggerHandles {
    let current_running = Arc::new(AtomicBool::new(false));
    let hourly_running = Arc::new(AtomicBool::new(false));
    let daily_running = Arc::new(AtomicBool::new(false));

    tokio::spawn(run_refresh_job::<CurrentKind>(
        deps.clone(),
        deps.config.current.scheduler_interval,
        current_running.clone(),
        state.clone(),
        |s| &mut s.current,
    ));
    tokio::spawn(run_refresh_job::<HourlyKind>(
        deps.clone(),
        deps.config.hourly.scheduler_interval,
        hourly_running.clone(),
        state.clone(),
        |s| &mut s.hourly,
    ));
    tokio::spawn(run_refresh_job::<DailyKind>(
        deps.clone(),
        deps.config.daily.scheduler_interval,
        daily_running.clone(),
        state.clone(),
        |s| &mut s.daily,
    ));

    ManualTriggerHandles {
        deps,
        state,
        current_running,
        hourly_running,
        daily_running,
    }
}

/// `POST /dev/run-scheduler-jobs` support: force one immediate pass of every
/// kind. Resolves the "does manual trigger drain in-flight ticks?"
/// question as no — a manual trigger that lands while a periodic tick is
/// already running for a kind simply skips that kind this time, identically
/// to how a periodic tick skips when another periodic tick is running.
#[derive(Clone)]
pub struct ManualTriggerHandles {
    deps: SchedulerDeps,
    state: SharedSchedulerState,
    current_running: Arc<AtomicBool>,
    hourly_running: Arc<AtomicBool>,
    daily_running: Arc<AtomicBool>,
}

impl ManualTriggerHandles {
    pub async fn trigger_all(&self) {
        let mut ticks = Vec::new();

        if !self.current_running.swap(true, Ordering::SeqCst) {
            ticks.push(tokio::spawn(run_and_release::<CurrentKind>(
                self.deps.clone(),
                self.state.clone(),
                self.current_running.clone(),
                |s| &mut s.current,
            )));
        }
        if !self.hourly_running.swap(true, Ordering::SeqCst) {
            ticks.push(tokio::spawn(run_and_release::<HourlyKind>(
                self.deps.clone(),
                self.state.clone(),
                self.hourly_running.clone(),
                |s| &mut s.hourly,
            )));
        }
        if !self.daily_running.swap(true, Ordering::SeqCst) {
            ticks.push(tokio::spawn(run_and_release::<DailyKind>(
                self.deps.clone(),
                self.state.clone(),
                self.daily_running.clone(),
                |s| &mut s.daily,
            )));
        }

        for handle in ticks {
            let _ = handle.await;
        }
    }
}

async fn run_and_release<K: ForecastKind>(
    deps: SchedulerDeps,
    state: SharedSchedulerState,
    running: Arc<AtomicBool>,
    status_field: fn(&mut SchedulerState) -> &mut JobStatus,
) {
    run_one_tick::<K>(&deps, &state, status_field).await;
    running.store(false, Ordering::SeqCst);
}
