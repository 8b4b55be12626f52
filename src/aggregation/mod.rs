//! Tiered fetch core.
//!
//! One generic algorithm, three forecast kinds. `ForecastKind` is a marker
//! trait implemented by three zero-sized types (`current`, `hourly`,
//! `daily`); each carries the SQL, fan-out, and validity logic for its kind
//! as associated functions, and `tiered_fetch` drives all three through the
//! same read-through sequence: cache, then record store, then providers.
//!
//! Uses native `async fn` in traits rather than `async-trait` — every call
//! site knows the concrete kind at compile time, so there's never a need to
//! box the future behind a trait object.

pub mod current;
pub mod daily;
pub mod hourly;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;

use crate::cache::{cache_key, CacheAdapter};
use crate::config::{AppConfig, KindTiming};
use crate::db::models::Location;
use crate::db::queries;
use crate::errors::AppError;
use crate::providers::ProviderClient;

/// Everything `tiered_fetch` needs to run one request, borrowed rather than
/// owned so call sites can build it cheaply from whatever app state they hold.
pub struct AggregationContext<'a> {
    pub pool: &'a PgPool,
    pub cache: &'a CacheAdapter,
    pub providers: &'a [ProviderClient],
    pub config: &'a AppConfig,
}

/// One forecast kind's storage, fan-out, and validity rules.
pub trait ForecastKind {
    /// The per-provider record this kind fetches, persists, and caches.
    type Normalized: Clone + Serialize + DeserializeOwned + Send + Sync;

    /// Redis key prefix.
    const CACHE_PREFIX: &'static str;
    /// Used only in log fields and panic messages, never surfaced to callers.
    const NAME: &'static str;

    fn timing(config: &AppConfig) -> KindTiming;

    /// A record-store read counts as fresh enough to skip a provider fetch
    /// only when every configured provider is represented (current) or the
    /// set is non-empty (hourly/daily).
    fn is_valid(records: &[Self::Normalized], provider_count: usize) -> bool;

    /// Deterministic ordering for a returned list: primary temporal field
    /// ascending, provider id ascending as the tiebreaker.
    fn sort_key(record: &Self::Normalized) -> (i64, String);

    /// Read persisted rows updated within `freshness_window`, converted to
    /// the same normalized shape fan-out produces.
    async fn read_store(
        pool: &PgPool,
        location_id: uuid::Uuid,
        freshness_window: Duration,
    ) -> Result<Vec<Self::Normalized>, sqlx::Error>;

    async fn fan_out(
        providers: &[ProviderClient],
        location: &Location,
    ) -> (Vec<Self::Normalized>, Option<String>);

    async fn write_store(
        pool: &PgPool,
        location_id: uuid::Uuid,
        records: &[Self::Normalized],
    ) -> Result<(), sqlx::Error>;

    /// Delete every persisted row for this kind at `location_id`. Used by the
    /// scheduler's refresh tick, which replaces a location's data wholesale
    /// rather than upserting over the tiered read path.
    async fn delete_store(pool: &PgPool, location_id: uuid::Uuid) -> Result<(), sqlx::Error>;
}

/// KV cache, then record store (if fresh and complete), then provider
/// fan-out. A provider-fan-out result is always written back through both
/// lower tiers before being returned, regardless of which tier served it.
pub async fn tiered_fetch<K: ForecastKind>(
    ctx: &AggregationContext<'_>,
    location: &Location,
) -> Result<Vec<K::Normalized>, AppError> {
    let timing = K::timing(ctx.config);
    let key = cache_key(K::CACHE_PREFIX, location.id);

    match ctx.cache.get(&key).await {
        Ok(Some(bytes)) => match serde_json::from_slice::<Vec<K::Normalized>>(&bytes) {
            Ok(mut records) if K::is_valid(&records, ctx.providers.len()) => {
                records.sort_by_key(|r| K::sort_key(r));
                tracing::debug!(kind = K::NAME, location = %location.id, "cache hit");
                return Ok(records);
            }
            Ok(_) => {
                tracing::debug!(
                    kind = K::NAME,
                    location = %location.id,
                    "cache entry no longer valid, falling through"
                );
            }
            Err(e) => {
                tracing::warn!(kind = K::NAME, error = %e, "discarding malformed cache entry");
            }
        },
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(kind = K::NAME, error = %e, "cache read failed, falling through");
        }
    }

    match K::read_store(ctx.pool, location.id, timing.freshness_window).await {
        Ok(mut records) if K::is_valid(&records, ctx.providers.len()) => {
            records.sort_by_key(|r| K::sort_key(r));
            tracing::debug!(kind = K::NAME, location = %location.id, "record store hit");
            populate_cache::<K>(ctx, &key, &records, timing.kv_ttl).await;
            return Ok(records);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(kind = K::NAME, error = %e, "record store read failed, falling through");
        }
    }

    tracing::info!(kind = K::NAME, location = %location.id, "fanning out to providers");
    let (mut records, timezone_hint) = K::fan_out(ctx.providers, location).await;

    if records.is_empty() {
        tracing::error!(kind = K::NAME, location = %location.id, "every provider failed, no data to serve");
        return Err(AppError::UpstreamUnavailable(format!(
            "no {} data available from any configured provider",
            K::NAME
        )));
    }

    records.sort_by_key(|r| K::sort_key(r));

    if let Some(hint) = timezone_hint {
        if location.timezone.as_deref() != Some(hint.as_str()) {
            if let Err(e) = queries::update_location_timezone(ctx.pool, location.id, &hint).await
            {
                tracing::warn!(error = %e, "failed to persist timezone hint");
            }
        }
    }

    if let Err(e) = K::write_store(ctx.pool, location.id, &records).await {
        tracing::error!(kind = K::NAME, error = %e, "failed to persist provider fan-out");
        return Err(AppError::RecordStoreError(e));
    }

    populate_cache::<K>(ctx, &key, &records, timing.kv_ttl).await;
    Ok(records)
}

pub(crate) async fn populate_cache<K: ForecastKind>(
    ctx: &AggregationContext<'_>,
    key: &str,
    records: &[K::Normalized],
    ttl: Duration,
) {
    match serde_json::to_vec(records) {
        Ok(bytes) => {
            if let Err(e) = ctx.cache.set(key, &bytes, ttl).await {
                tracing::warn!(kind = K::NAME, error = %e, "cache write failed");
            }
        }
        Err(e) => tracing::warn!(kind = K::NAME, error = %e, "failed to serialize cache entry"),
    }
}
