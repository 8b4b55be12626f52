use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::{AppConfig, KindTiming};
use crate::db::models::{HourlyForecastRow, Location};
use crate::db::queries;
use crate::providers::{self, NormalizedHourly, ProviderClient};

use super::ForecastKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub provider_id: String,
    pub forecast_datetime_utc: chrono::DateTime<Utc>,
    pub temperature_c: rust_decimal::Decimal,
    pub humidity_pct: rust_decimal::Decimal,
    pub wind_speed_kmh: rust_decimal::Decimal,
    pub precipitation_mm: rust_decimal::Decimal,
    pub precipitation_chance_pct: rust_decimal::Decimal,
    pub condition: String,
}

impl From<NormalizedHourly> for HourlyRecord {
    fn from(n: NormalizedHourly) -> Self {
        Self {
            provider_id: n.provider_id,
            forecast_datetime_utc: n.forecast_datetime_utc,
            temperature_c: n.temperature_c,
            humidity_pct: n.humidity_pct,
            wind_speed_kmh: n.wind_speed_kmh,
            precipitation_mm: n.precipitation_mm,
            precipitation_chance_pct: n.precipitation_chance_pct,
            condition: n.condition,
        }
    }
}

impl From<HourlyForecastRow> for HourlyRecord {
    fn from(row: HourlyForecastRow) -> Self {
        Self {
            provider_id: row.provider_id,
            forecast_datetime_utc: row.forecast_datetime_utc,
            temperature_c: row.temperature_c,
            humidity_pct: row.humidity_pct,
            wind_speed_kmh: row.wind_speed_kmh,
            precipitation_mm: row.precipitation_mm,
            precipitation_chance_pct: row.precipitation_chance_pct,
            condition: row.condition,
        }
    }
}

pub struct HourlyKind;

impl ForecastKind for HourlyKind {
    type Normalized = HourlyRecord;

    const CACHE_PREFIX: &'static str = "hourlyforecast";
    const NAME: &'static str = "hourly";

    fn timing(config: &AppConfig) -> KindTiming {
        config.hourly
    }

    /// Unlike current weather, a provider dropping out mid-window doesn't
    /// invalidate the rest — any non-empty set of upcoming slices is usable.
    fn is_valid(records: &[Self::Normalized], _provider_count: usize) -> bool {
        !records.is_empty()
    }

    fn sort_key(record: &Self::Normalized) -> (i64, String) {
        (
            record.forecast_datetime_utc.timestamp(),
            record.provider_id.clone(),
        )
    }

    async fn read_store(
        pool: &PgPool,
        location_id: uuid::Uuid,
        freshness_window: Duration,
    ) -> Result<Vec<Self::Normalized>, sqlx::Error> {
        let now = Utc::now();
        let rows = queries::get_upcoming_hourly(pool, location_id, now).await?;
        let threshold = now - freshness_window;
        Ok(rows
            .into_iter()
            .filter(|r| r.updated_at >= threshold)
            .map(HourlyRecord::from)
            .collect())
    }

    async fn fan_out(
        providers: &[ProviderClient],
        location: &Location,
    ) -> (Vec<Self::Normalized>, Option<String>) {
        let result = providers::fan_out_hourly(providers, location).await;
        (
            result.records.into_iter().map(HourlyRecord::from).collect(),
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
            let row = HourlyForecastRow {
                location_id,
                provider_id: record.provider_id.clone(),
                forecast_datetime_utc: record.forecast_datetime_utc,
                temperature_c: record.temperature_c,
                humidity_pct: record.humidity_pct,
                wind_speed_kmh: record.wind_speed_kmh,
                precipitation_mm: record.precipitation_mm,
                precipitation_chance_pct: record.precipitation_chance_pct,
                condition: record.condition.clone(),
                updated_at: now,
            };
            queries::upsert_hourly_forecast(pool, &row).await?;
        }
        Ok(())
    }

    async fn delete_store(pool: &PgPool, location_id: uuid::Uuid) -> Result<(), sqlx::Error> {
        queries::delete_hourly_forecasts_for_location(pool, location_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_accepts_partial_provider_set() {
        let records = vec![HourlyRecord {
            provider_id: "open-meteo".to_string(),
            forecast_datetime_utc: Utc::now(),
            temperature_c: rust_decimal::Decimal::ZERO,
            humidity_pct: rust_decimal::Decimal::ZERO,
            wind_speed_kmh: rust_decimal::Decimal::ZERO,
            precipitation_mm: rust_decimal::Decimal::ZERO,
            precipitation_chance_pct: rust_decimal::Decimal::ZERO,
            condition: "clear".to_string(),
        }];
        assert!(HourlyKind::is_valid(&records, 3));
    }

    #[test]
    fn test_is_valid_rejects_empty() {
        assert!(!HourlyKind::is_valid(&[], 3));
    }
}
