use std::time::Duration;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::{AppConfig, KindTiming};
use crate::db::models::{DailyForecastRow, Location};
use crate::db::queries;
use crate::providers::{self, NormalizedDaily, ProviderClient};

use super::ForecastKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub provider_id: String,
    pub forecast_date: chrono::NaiveDate,
    pub min_temp_c: rust_decimal::Decimal,
    pub max_temp_c: rust_decimal::Decimal,
    pub precipitation_mm: rust_decimal::Decimal,
    pub precipitation_chance_pct: rust_decimal::Decimal,
    pub wind_speed_kmh: rust_decimal::Decimal,
    pub humidity_pct: rust_decimal::Decimal,
}

impl From<NormalizedDaily> for DailyRecord {
    fn from(n: NormalizedDaily) -> Self {
        Self {
            provider_id: n.provider_id,
            forecast_date: n.forecast_date,
            min_temp_c: n.min_temp_c,
            max_temp_c: n.max_temp_c,
            precipitation_mm: n.precipitation_mm,
            precipitation_chance_pct: n.precipitation_chance_pct,
            wind_speed_kmh: n.wind_speed_kmh,
            humidity_pct: n.humidity_pct,
        }
    }
}

impl From<DailyForecastRow> for DailyRecord {
    fn from(row: DailyForecastRow) -> Self {
        Self {
            provider_id: row.provider_id,
            forecast_date: row.forecast_date,
            min_temp_c: row.min_temp_c,
            max_temp_c: row.max_temp_c,
            precipitation_mm: row.precipitation_mm,
            precipitation_chance_pct: row.precipitation_chance_pct,
            wind_speed_kmh: row.wind_speed_kmh,
            humidity_pct: row.humidity_pct,
        }
    }
}

pub struct DailyKind;

impl ForecastKind for DailyKind {
    type Normalized = DailyRecord;

    const CACHE_PREFIX: &'static str = "dailyforecast";
    const NAME: &'static str = "daily";

    fn timing(config: &AppConfig) -> KindTiming {
        config.daily
    }

    fn is_valid(records: &[Self::Normalized], _provider_count: usize) -> bool {
        !records.is_empty()
    }

    fn sort_key(record: &Self::Normalized) -> (i64, String) {
        (
            i64::from(record.forecast_date.num_days_from_ce()),
            record.provider_id.clone(),
        )
    }

    async fn read_store(
        pool: &PgPool,
        location_id: uuid::Uuid,
        freshness_window: Duration,
    ) -> Result<Vec<Self::Normalized>, sqlx::Error> {
        let now = Utc::now();
        let rows = queries::get_upcoming_daily(pool, location_id, now.date_naive()).await?;
        let threshold = now - freshness_window;
        Ok(rows
            .into_iter()
            .filter(|r| r.updated_at >= threshold)
            .map(DailyRecord::from)
            .collect())
    }

    async fn fan_out(
        providers: &[ProviderClient],
        location: &Location,
    ) -> (Vec<Self::Normalized>, Option<String>) {
        let result = providers::fan_out_daily(providers, location).await;
        (
            result.records.into_iter().map(DailyRecord::from).collect(),
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
            let row = DailyForecastRow {
                location_id,
                provider_id: record.provider_id.clone(),
                forecast_date: record.forecast_date,
                min_temp_c: record.min_temp_c,
                max_temp_c: record.max_temp_c,
                precipitation_mm: record.precipitation_mm,
                precipitation_chance_pct: record.precipitation_chance_pct,
                wind_speed_kmh: record.wind_speed_kmh,
                humidity_pct: record.humidity_pct,
                updated_at: now,
            };
            queries::upsert_daily_forecast(pool, &row).await?;
        }
        Ok(())
    }

    async fn delete_store(pool: &PgPool, location_id: uuid::Uuid) -> Result<(), sqlx::Error> {
        queries::delete_daily_forecasts_for_location(pool, location_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_rejects_empty() {
        assert!(!DailyKind::is_valid(&[], 3));
    }

    #[test]
    fn test_is_valid_accepts_single_provider() {
        let records = vec![DailyRecord {
            provider_id: "weatherapi".to_string(),
            forecast_date: Utc::now().date_naive(),
            min_temp_c: rust_decimal::Decimal::ZERO,
            max_temp_c: rust_decimal::Decimal::ZERO,
            precipitation_mm: rust_decimal::Decimal::ZERO,
            precipitation_chance_pct: rust_decimal::Decimal::ZERO,
            wind_speed_kmh: rust_decimal::Decimal::ZERO,
            humidity_pct: rust_decimal::Decimal::ZERO,
        }];
        assert!(DailyKind::is_valid(&records, 3));
    }
}
