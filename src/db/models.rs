use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A deduplicated geographic location.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Location {
    pub id: Uuid,
    pub canonical_name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Option<String>,
}

/// A normalised user-input string mapped to a `Location`.
#[derive(Debug, Clone, FromRow)]
pub struct LocationAlias {
    pub alias: String,
    pub location_id: Uuid,
}

/// Per-provider current-weather row, keyed by `(location_id, provider_id)`.
#[derive(Debug, Clone, FromRow)]
pub struct CurrentWeatherRow {
    pub location_id: Uuid,
    pub provider_id: String,
    pub observed_at: DateTime<Utc>,
    pub temperature_c: Decimal,
    pub humidity_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub precipitation_mm: Decimal,
    pub condition: String,
    pub updated_at: DateTime<Utc>,
}

/// Per-provider hourly-forecast row, keyed by `(location_id, provider_id, forecast_datetime_utc)`.
#[derive(Debug, Clone, FromRow)]
pub struct HourlyForecastRow {
    pub location_id: Uuid,
    pub provider_id: String,
    pub forecast_datetime_utc: DateTime<Utc>,
    pub temperature_c: Decimal,
    pub humidity_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub precipitation_mm: Decimal,
    pub precipitation_chance_pct: Decimal,
    pub condition: String,
    pub updated_at: DateTime<Utc>,
}

/// Per-provider daily-forecast row, keyed by `(location_id, provider_id, forecast_date)`.
#[derive(Debug, Clone, FromRow)]
pub struct DailyForecastRow {
    pub location_id: Uuid,
    pub provider_id: String,
    pub forecast_date: NaiveDate,
    pub min_temp_c: Decimal,
    pub max_temp_c: Decimal,
    pub precipitation_mm: Decimal,
    pub precipitation_chance_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub humidity_pct: Decimal,
    pub updated_at: DateTime<Utc>,
}
