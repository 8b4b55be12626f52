//! Weather HTTP endpoints.
//!
//! - GET /api/currentweather?city=... | ?lat=...&lon=...
//! - GET /api/hourlyforecast?city=... | ?lat=...&lon=...
//! - GET /api/dailyforecast?city=... | ?lat=...&lon=...
//!
//! Each handler resolves the location, then drives it through `tiered_fetch`
//! for its kind — the handler itself knows nothing about caching or
//! freshness, only which `ForecastKind` to ask for.

use std::str::FromStr;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::aggregation::current::CurrentRecord;
use crate::aggregation::daily::DailyRecord;
use crate::aggregation::hourly::HourlyRecord;
use crate::aggregation::{current::CurrentKind, daily::DailyKind, hourly::HourlyKind};
use crate::aggregation::{tiered_fetch, AggregationContext};
use crate::db::models::Location;
use crate::errors::{AppError, ErrorResponse};
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LocationQuery {
    /// Free-form city name, e.g. "Zurich" or "Zurich, CH"
    pub city: Option<String>,
    /// Latitude in degrees, used together with `lon`
    pub lat: Option<f64>,
    /// Longitude in degrees, used together with `lat`
    pub lon: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationSummary {
    pub canonical_name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Option<String>,
}

/// Format a UTC instant in the Location's IANA timezone; falls back to UTC
/// (with a warning) when the zone is unknown or fails to parse.
fn format_local(dt: DateTime<Utc>, location: &Location) -> String {
    match location.timezone.as_deref().map(Tz::from_str) {
        Some(Ok(tz)) => dt.with_timezone(&tz).to_rfc3339(),
        Some(Err(_)) => {
            tracing::warn!(
                location = %location.id,
                timezone = ?location.timezone,
                "location has an unparseable timezone, formatting in UTC"
            );
            dt.to_rfc3339()
        }
        None => {
            tracing::warn!(location = %location.id, "location has no known timezone, formatting in UTC");
            dt.to_rfc3339()
        }
    }
}

impl From<&Location> for LocationSummary {
    fn from(l: &Location) -> Self {
        Self {
            canonical_name: l.canonical_name.clone(),
            country_code: l.country_code.clone(),
            latitude: l.latitude,
            longitude: l.longitude,
            timezone: l.timezone.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeatherEntry {
    pub provider_id: String,
    pub observed_at: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
    pub precipitation_mm: f64,
    pub condition: String,
}

impl CurrentWeatherEntry {
    fn from_record(r: &CurrentRecord, location: &Location) -> Self {
        Self {
            provider_id: r.provider_id.clone(),
            observed_at: format_local(r.observed_at, location),
            temperature_c: r.temperature_c.to_f64().unwrap_or(0.0),
            humidity_pct: r.humidity_pct.to_f64().unwrap_or(0.0),
            wind_speed_kmh: r.wind_speed_kmh.to_f64().unwrap_or(0.0),
            precipitation_mm: r.precipitation_mm.to_f64().unwrap_or(0.0),
            condition: r.condition.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentWeatherResponse {
    pub location: LocationSummary,
    pub weather: Vec<CurrentWeatherEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HourlyForecastEntry {
    pub provider_id: String,
    pub forecast_datetime: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
    pub precipitation_mm: f64,
    pub precipitation_chance_pct: f64,
    pub condition: String,
}

impl HourlyForecastEntry {
    fn from_record(r: &HourlyRecord, location: &Location) -> Self {
        Self {
            provider_id: r.provider_id.clone(),
            forecast_datetime: format_local(r.forecast_datetime_utc, location),
            temperature_c: r.temperature_c.to_f64().unwrap_or(0.0),
            humidity_pct: r.humidity_pct.to_f64().unwrap_or(0.0),
            wind_speed_kmh: r.wind_speed_kmh.to_f64().unwrap_or(0.0),
            precipitation_mm: r.precipitation_mm.to_f64().unwrap_or(0.0),
            precipitation_chance_pct: r.precipitation_chance_pct.to_f64().unwrap_or(0.0),
            condition: r.condition.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HourlyForecastResponse {
    pub location: LocationSummary,
    pub forecasts: Vec<HourlyForecastEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyForecastEntry {
    pub provider_id: String,
    pub forecast_date: String,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    pub precipitation_mm: f64,
    pub precipitation_chance_pct: f64,
    pub wind_speed_kmh: f64,
    pub humidity_pct: f64,
}

impl From<&DailyRecord> for DailyForecastEntry {
    fn from(r: &DailyRecord) -> Self {
        Self {
            provider_id: r.provider_id.clone(),
            forecast_date: r.forecast_date.to_string(),
            min_temp_c: r.min_temp_c.to_f64().unwrap_or(0.0),
            max_temp_c: r.max_temp_c.to_f64().unwrap_or(0.0),
            precipitation_mm: r.precipitation_mm.to_f64().unwrap_or(0.0),
            precipitation_chance_pct: r.precipitation_chance_pct.to_f64().unwrap_or(0.0),
            wind_speed_kmh: r.wind_speed_kmh.to_f64().unwrap_or(0.0),
            humidity_pct: r.humidity_pct.to_f64().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyForecastResponse {
    pub location: LocationSummary,
    pub forecasts: Vec<DailyForecastEntry>,
}

async fn resolve_from_query(
    state: &AppState,
    query: &LocationQuery,
) -> Result<Location, AppError> {
    match (&query.city, query.lat, query.lon) {
        (Some(city), _, _) => crate::location::resolve(&state.pool, &state.geocoder, city).await,
        (None, Some(lat), Some(lon)) => {
            crate::location::resolve_coords(&state.pool, &state.geocoder, lat, lon).await
        }
        _ => Err(AppError::InvalidInput(
            "provide either `city` or both `lat` and `lon`".to_string(),
        )),
    }
}

/// Get current weather for a location.
#[utoipa::path(
    get,
    path = "/api/currentweather",
    tag = "Weather",
    params(LocationQuery),
    responses(
        (status = 200, description = "Current weather from every configured provider", body = CurrentWeatherResponse),
        (status = 400, description = "Invalid or missing location", body = ErrorResponse),
    )
)]
pub async fn get_current_weather(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<CurrentWeatherResponse>, AppError> {
    let location = resolve_from_query(&state, &query).await?;
    let ctx = AggregationContext {
        pool: &state.pool,
        cache: &state.cache,
        providers: &state.providers,
        config: &state.config,
    };
    let records = tiered_fetch::<CurrentKind>(&ctx, &location).await?;

    Ok(Json(CurrentWeatherResponse {
        location: LocationSummary::from(&location),
        weather: records
            .iter()
            .map(|r| CurrentWeatherEntry::from_record(r, &location))
            .collect(),
    }))
}

/// Get hourly forecasts for a location.
#[utoipa::path(
    get,
    path = "/api/hourlyforecast",
    tag = "Weather",
    params(LocationQuery),
    responses(
        (status = 200, description = "Upcoming hourly forecasts from every configured provider", body = HourlyForecastResponse),
        (status = 400, description = "Invalid or missing location", body = ErrorResponse),
    )
)]
pub async fn get_hourly_forecast(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<HourlyForecastResponse>, AppError> {
    let location = resolve_from_query(&state, &query).await?;
    let ctx = AggregationContext {
        pool: &state.pool,
        cache: &state.cache,
        providers: &state.providers,
        config: &state.config,
    };
    let records = tiered_fetch::<HourlyKind>(&ctx, &location).await?;

    Ok(Json(HourlyForecastResponse {
        location: LocationSummary::from(&location),
        forecasts: records
            .iter()
            .map(|r| HourlyForecastEntry::from_record(r, &location))
            .collect(),
    }))
}

/// Get daily forecasts for a location.
#[utoipa::path(
    get,
    path = "/api/dailyforecast",
    tag = "Weather",
    params(LocationQuery),
    responses(
        (status = 200, description = "Upcoming daily forecasts from every configured provider", body = DailyForecastResponse),
        (status = 400, description = "Invalid or missing location", body = ErrorResponse),
    )
)]
pub async fn get_daily_forecast(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<DailyForecastResponse>, AppError> {
    let location = resolve_from_query(&state, &query).await?;
    let ctx = AggregationContext {
        pool: &state.pool,
        cache: &state.cache,
        providers: &state.providers,
        config: &state.config,
    };
    let records = tiered_fetch::<DailyKind>(&ctx, &location).await?;

    Ok(Json(DailyForecastResponse {
        location: LocationSummary::from(&location),
        forecasts: records.iter().map(DailyForecastEntry::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_location_query_requires_one_form() {
        let empty = LocationQuery {
            city: None,
            lat: None,
            lon: None,
        };
        assert!(empty.city.is_none() && empty.lat.is_none());
    }

    fn location(timezone: Option<&str>) -> Location {
        Location {
            id: Uuid::new_v4(),
            canonical_name: "Zurich".to_string(),
            country_code: "CH".to_string(),
            latitude: 47.37,
            longitude: 8.54,
            timezone: timezone.map(str::to_string),
        }
    }

    #[test]
    fn test_format_local_converts_to_known_timezone() {
        let dt = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let formatted = format_local(dt, &location(Some("Europe/Zurich")));
        assert!(formatted.starts_with("2026-01-01T01:00:00"));
    }

    #[test]
    fn test_format_local_falls_back_to_utc_when_unknown() {
        let dt = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_local(dt, &location(None)), dt.to_rfc3339());
    }
}
