//! Record store adapter.
//!
//! Raw SQL via `sqlx::query`/`sqlx::query_as`, not compile-time-checked
//! `query!` macros — this binary has no build-time database connection to
//! check against. Column lists are kept in sync with `db::models` by hand;
//! see the comment on each struct's matching SELECT.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{CurrentWeatherRow, DailyForecastRow, HourlyForecastRow, Location};

// ---------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------

const LOCATION_COLUMNS: &str = "id, canonical_name, country_code, latitude, longitude, timezone";

pub async fn get_location_by_alias(
    pool: &PgPool,
    alias: &str,
) -> Result<Option<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>(
        "SELECT l.id, l.canonical_name, l.country_code, l.latitude, l.longitude, l.timezone \
         FROM locations l \
         JOIN location_aliases a ON a.location_id = l.id \
         WHERE a.alias = $1",
    )
    .bind(alias)
    .fetch_optional(pool)
    .await
}

pub async fn get_location_by_name(
    pool: &PgPool,
    canonical_name: &str,
    country_code: &str,
) -> Result<Option<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM locations WHERE canonical_name = $1 AND country_code = $2"
    ))
    .bind(canonical_name)
    .bind(country_code)
    .fetch_optional(pool)
    .await
}

pub async fn get_location_by_coordinates(
    pool: &PgPool,
    latitude: f64,
    longitude: f64,
) -> Result<Option<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM locations WHERE latitude = $1 AND longitude = $2"
    ))
    .bind(latitude)
    .bind(longitude)
    .fetch_optional(pool)
    .await
}

pub async fn create_location(
    pool: &PgPool,
    canonical_name: &str,
    country_code: &str,
    latitude: f64,
    longitude: f64,
    timezone: Option<&str>,
) -> Result<Location, sqlx::Error> {
    sqlx::query_as::<_, Location>(&format!(
        "INSERT INTO locations (id, canonical_name, country_code, latitude, longitude, timezone) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (canonical_name, country_code) DO UPDATE SET canonical_name = EXCLUDED.canonical_name \
         RETURNING {LOCATION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(canonical_name)
    .bind(country_code)
    .bind(latitude)
    .bind(longitude)
    .bind(timezone)
    .fetch_one(pool)
    .await
}

/// Racing callers may both attempt to create the same Location. The
/// unique index on `(canonical_name, country_code)` combined with the
/// `ON CONFLICT ... DO UPDATE` above means this always returns the winning
/// row rather than erroring, so callers never need to special-case the race.
pub async fn update_location_timezone(
    pool: &PgPool,
    location_id: Uuid,
    timezone: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE locations SET timezone = $1 WHERE id = $2 AND timezone IS DISTINCT FROM $1")
        .bind(timezone)
        .bind(location_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_locations(pool: &PgPool) -> Result<Vec<Location>, sqlx::Error> {
    sqlx::query_as::<_, Location>(&format!("SELECT {LOCATION_COLUMNS} FROM locations"))
        .fetch_all(pool)
        .await
}

/// Cascades to aliases and every weather/forecast row via `ON DELETE CASCADE`
/// foreign keys.
pub async fn delete_all_locations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM locations").execute(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------
// Aliases
// ---------------------------------------------------------------------

/// Best-effort by contract: a
/// duplicate-key violation on `alias` is treated as success by the caller,
/// not surfaced as a distinguishable error here — `ON CONFLICT DO NOTHING`
/// already makes the insert itself idempotent.
pub async fn create_alias(
    pool: &PgPool,
    alias: &str,
    location_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO location_aliases (alias, location_id) VALUES ($1, $2) \
         ON CONFLICT (alias) DO NOTHING",
    )
    .bind(alias)
    .bind(location_id)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------
// Current weather
// ---------------------------------------------------------------------

const CURRENT_WEATHER_COLUMNS: &str = "location_id, provider_id, observed_at, temperature_c, \
    humidity_pct, wind_speed_kmh, precipitation_mm, condition, updated_at";

pub async fn get_current_weather(
    pool: &PgPool,
    location_id: Uuid,
) -> Result<Vec<CurrentWeatherRow>, sqlx::Error> {
    sqlx::query_as::<_, CurrentWeatherRow>(&format!(
        "SELECT {CURRENT_WEATHER_COLUMNS} FROM current_weather WHERE location_id = $1"
    ))
    .bind(location_id)
    .fetch_all(pool)
    .await
}

pub async fn upsert_current_weather(
    pool: &PgPool,
    row: &CurrentWeatherRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO current_weather \
         (location_id, provider_id, observed_at, temperature_c, humidity_pct, \
          wind_speed_kmh, precipitation_mm, condition, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (location_id, provider_id) DO UPDATE SET \
           observed_at = EXCLUDED.observed_at, \
           temperature_c = EXCLUDED.temperature_c, \
           humidity_pct = EXCLUDED.humidity_pct, \
           wind_speed_kmh = EXCLUDED.wind_speed_kmh, \
           precipitation_mm = EXCLUDED.precipitation_mm, \
           condition = EXCLUDED.condition, \
           updated_at = EXCLUDED.updated_at",
    )
    .bind(row.location_id)
    .bind(&row.provider_id)
    .bind(row.observed_at)
    .bind(row.temperature_c)
    .bind(row.humidity_pct)
    .bind(row.wind_speed_kmh)
    .bind(row.precipitation_mm)
    .bind(&row.condition)
    .bind(row.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_current_weather_for_location(
    pool: &PgPool,
    location_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM current_weather WHERE location_id = $1")
        .bind(location_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------
// Hourly forecasts
// ---------------------------------------------------------------------

const HOURLY_FORECAST_COLUMNS: &str = "location_id, provider_id, forecast_datetime_utc, \
    temperature_c, humidity_pct, wind_speed_kmh, precipitation_mm, precipitation_chance_pct, \
    condition, updated_at";

pub async fn get_upcoming_hourly(
    pool: &PgPool,
    location_id: Uuid,
    after: DateTime<Utc>,
) -> Result<Vec<HourlyForecastRow>, sqlx::Error> {
    sqlx::query_as::<_, HourlyForecastRow>(&format!(
        "SELECT {HOURLY_FORECAST_COLUMNS} FROM hourly_forecasts \
         WHERE location_id = $1 AND forecast_datetime_utc >= $2"
    ))
    .bind(location_id)
    .bind(after)
    .fetch_all(pool)
    .await
}

pub async fn upsert_hourly_forecast(
    pool: &PgPool,
    row: &HourlyForecastRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO hourly_forecasts \
         (location_id, provider_id, forecast_datetime_utc, temperature_c, humidity_pct, \
          wind_speed_kmh, precipitation_mm, precipitation_chance_pct, condition, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (location_id, provider_id, forecast_datetime_utc) DO UPDATE SET \
           temperature_c = EXCLUDED.temperature_c, \
           humidity_pct = EXCLUDED.humidity_pct, \
           wind_speed_kmh = EXCLUDED.wind_speed_kmh, \
           precipitation_mm = EXCLUDED.precipitation_mm, \
           precipitation_chance_pct = EXCLUDED.precipitation_chance_pct, \
           condition = EXCLUDED.condition, \
           updated_at = EXCLUDED.updated_at",
    )
    .bind(row.location_id)
    .bind(&row.provider_id)
    .bind(row.forecast_datetime_utc)
    .bind(row.temperature_c)
    .bind(row.humidity_pct)
    .bind(row.wind_speed_kmh)
    .bind(row.precipitation_mm)
    .bind(row.precipitation_chance_pct)
    .bind(&row.condition)
    .bind(row.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_hourly_forecasts_for_location(
    pool: &PgPool,
    location_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM hourly_forecasts WHERE location_id = $1")
        .bind(location_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------
// Daily forecasts
// ---------------------------------------------------------------------

const DAILY_FORECAST_COLUMNS: &str = "location_id, provider_id, forecast_date, min_temp_c, \
    max_temp_c, precipitation_mm, precipitation_chance_pct, wind_speed_kmh, humidity_pct, updated_at";

pub async fn get_upcoming_daily(
    pool: &PgPool,
    location_id: Uuid,
    after_date: NaiveDate,
) -> Result<Vec<DailyForecastRow>, sqlx::Error> {
    sqlx::query_as::<_, DailyForecastRow>(&format!(
        "SELECT {DAILY_FORECAST_COLUMNS} FROM daily_forecasts \
         WHERE location_id = $1 AND forecast_date >= $2"
    ))
    .bind(location_id)
    .bind(after_date)
    .fetch_all(pool)
    .await
}

pub async fn upsert_daily_forecast(
    pool: &PgPool,
    row: &DailyForecastRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO daily_forecasts \
         (location_id, provider_id, forecast_date, min_temp_c, max_temp_c, precipitation_mm, \
          precipitation_chance_pct, wind_speed_kmh, humidity_pct, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (location_id, provider_id, forecast_date) DO UPDATE SET \
           min_temp_c = EXCLUDED.min_temp_c, \
           max_temp_c = EXCLUDED.max_temp_c, \
           precipitation_mm = EXCLUDED.precipitation_mm, \
           precipitation_chance_pct = EXCLUDED.precipitation_chance_pct, \
           wind_speed_kmh = EXCLUDED.wind_speed_kmh, \
           humidity_pct = EXCLUDED.humidity_pct, \
           updated_at = EXCLUDED.updated_at",
    )
    .bind(row.location_id)
    .bind(&row.provider_id)
    .bind(row.forecast_date)
    .bind(row.min_temp_c)
    .bind(row.max_temp_c)
    .bind(row.precipitation_mm)
    .bind(row.precipitation_chance_pct)
    .bind(row.wind_speed_kmh)
    .bind(row.humidity_pct)
    .bind(row.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_daily_forecasts_for_location(
    pool: &PgPool,
    location_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM daily_forecasts WHERE location_id = $1")
        .bind(location_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_columns_match_model_field_count() {
        // Sanity check: keep this constant's arity in sync with `Location`
        // whenever a field is added or removed from the model.
        assert_eq!(LOCATION_COLUMNS.split(',').count(), 6);
    }

    #[test]
    fn test_current_weather_columns_match_model_field_count() {
        assert_eq!(CURRENT_WEATHER_COLUMNS.split(',').count(), 9);
    }

    #[test]
    fn test_hourly_forecast_columns_match_model_field_count() {
        assert_eq!(HOURLY_FORECAST_COLUMNS.split(',').count(), 10);
    }

    #[test]
    fn test_daily_forecast_columns_match_model_field_count() {
        assert_eq!(DAILY_FORECAST_COLUMNS.split(',').count(), 10);
    }
}
