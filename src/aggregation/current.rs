use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::{AppConfig, KindTiming};
use crate::db::models::{CurrentWeatherRow, Location};
use crate::db::queries;
use crate::providers::{self, NormalizedCurrent, ProviderClient};

use super::ForecastKind;

/// Cache-serializable counterpart of [`NormalizedCurrent`] — the provider
/// client's type carries no `Serialize`/`Deserialize` impls of its own since
/// it's an internal fan-out shape, not a wire or storage one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRecord {
    pub provider_id: String,
    pub observed_at: chrono::DateTime<Utc>,
    pub temperature_c: rust_decimal::Decimal,
    pub humidity_pct: rust_decimal::Decimal,
    pub wind_speed_kmh: rust_decimal::Decimal,
    pub precipitation_mm: rust_decimal::Decimal,
    pub condition: String,
}

impl From<NormalizedCurrent> for CurrentRecord {
    fn from(n: NormalizedCurrent) -> Self {
        Self {
            provider_id: n.provider_id,
            observed_at: n.observed_at,
            temperature_c: n.temperature_c,
            humidity_pct: n.humidity_pct,
            wind_speed_kmh: n.wind_speed_kmh,
            precipitation_mm: n.precipitation_mm,
            condition: n.condition,
        }
    }
}

impl From<CurrentWeatherRow> for CurrentRecord {
    fn from(row: CurrentWeatherRow) -> Self {
        Self {
            provider_id: row.provider_id,
            observed_at: row.observed_at,
            temperature_c: row.temperature_c,
            humidity_pct: row.humidity_pct,
            wind_speed_kmh: row.wind_speed_kmh,
            precipitation_mm: row.precipitation_mm,
            condition: row.condition,
        }
    }
}

pub struct CurrentKind;

impl ForecastKind for CurrentKind {
    type Normalized = CurrentRecord;

    const CACHE_PREFIX: &'static str = "currentweather";
    const NAME: &'static str = "current";

    fn timing(config: &AppConfig) -> KindTiming {
        config.current
    }

    /// Complete means every configured provider contributed a reading — a
    /// partial set never counts as a cache-worthy record-store hit.
    fn is_valid(records: &[Self::Normalized], provider_count: usize) -> bool {
        !records.is_empty() && records.len() >= provider_count
    }

    fn sort_key(record: &Self::Normalized) -> (i64, String) {
        (record.observed_at.timestamp(), record.provider_id.clone())
    }

    async fn read_store(
        pool: &PgPool,
        location_id: uuid::Uuid,
        freshness_window: Duration,
    ) -> Result<Vec<Self::Normalized>, sqlx::Error> {
        let rows = queries::get_current_weather(pool, location_id).await?;
        let threshold = Utc::now() - freshness_window;
        Ok(rows
            .into_iter()
            .filter(|r| r.updated_at >= threshold)
            .map(CurrentRecord::from)
            .collect())
    }

    async fn fan_out(
        providers: &[ProviderClient],
        location: &Location,
    ) -> (Vec<Self::Normalized>, Option<String>) {
        let result = providers::fan_out_current(providers, location).await;
        (
            result.records.into_iter().map(CurrentRecord::from).collect(),
            result.timezone_hint,
        )
    }

    async fn write_store(
        pool: &PgPool,
        location_id: uuid::Uuid,
        records: &[Self::Normalized],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        for record in records {
            let row = CurrentWeatherRow {
                location_id,
                provider_id: record.provider_id.clone(),
                observed_at: record.observed_at,
                temperature_c: record.temperature_c,
                humidity_pct: record.humidity_pct,
                wind_speed_kmh: record.wind_speed_kmh,
                precipitation_mm: record.precipitation_mm,
                condition: record.condition.clone(),
                updated_at: now,
            };
            queries::upsert_current_weather(pool, &row).await?;
        }
        Ok(())
    }

    async fn delete_store(pool: &PgPool, location_id: uuid::Uuid) -> Result<(), sqlx::Error> {
        queries::delete_current_weather_for_location(pool, location_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(provider_id: &str) -> CurrentRecord {
        CurrentRecord {
            provider_id: provider_id.to_string(),
            observed_at: Utc::now(),
            temperature_c: rust_decimal::Decimal::ZERO,
            humidity_pct: rust_decimal::Decimal::ZERO,
            wind_speed_kmh: rust_decimal::Decimal::ZERO,
            precipitation_mm: rust_decimal::Decimal::ZERO,
            condition: "clear".to_string(),
        }
    }

    #[test]
    fn test_is_valid_requires_full_provider_set() {
        let records = vec![record("openweathermap"), record("open-meteo")];
        assert!(!CurrentKind::is_valid(&records, 3));
        assert!(CurrentKind::is_valid(&records, 2));
    }

    #[test]
    fn test_is_valid_rejects_empty() {
        assert!(!CurrentKind::is_valid(&[], 0));
    }
}
