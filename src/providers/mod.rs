//! Weather provider clients, dispatched through a kind-tagged enum.
//!
//! Three concrete weather providers, dispatched through a kind-tagged enum
//! rather than a boxed trait object — this stack has no `async-trait`
//! dependency anywhere, and a plain `match` over a closed set of three
//! variants is both simpler and dispatches without any heap allocation.

pub mod open_meteo;
pub mod openweathermap;
pub mod weatherapi;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::config::ProviderConfig;
use crate::db::models::Location;

/// A provider-level failure, tagged with the provider id so fan-out never
/// loses attribution.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider '{provider_id}': {message}")]
pub struct ProviderError {
    pub provider_id: String,
    pub message: String,
}

/// Normalised current-weather reading from one provider.
#[derive(Debug, Clone)]
pub struct NormalizedCurrent {
    pub provider_id: String,
    pub observed_at: DateTime<Utc>,
    pub temperature_c: Decimal,
    pub humidity_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub precipitation_mm: Decimal,
    pub condition: String,
}

/// Normalised hourly-forecast slice from one provider.
#[derive(Debug, Clone)]
pub struct NormalizedHourly {
    pub provider_id: String,
    pub forecast_datetime_utc: DateTime<Utc>,
    pub temperature_c: Decimal,
    pub humidity_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub precipitation_mm: Decimal,
    pub precipitation_chance_pct: Decimal,
    pub condition: String,
}

/// Normalised daily-forecast slice from one provider.
#[derive(Debug, Clone)]
pub struct NormalizedDaily {
    pub provider_id: String,
    pub forecast_date: NaiveDate,
    pub min_temp_c: Decimal,
    pub max_temp_c: Decimal,
    pub precipitation_mm: Decimal,
    pub precipitation_chance_pct: Decimal,
    pub wind_speed_kmh: Decimal,
    pub humidity_pct: Decimal,
}

/// Result of a provider fan-out for one forecast kind.
#[derive(Debug, Clone, Default)]
pub struct FanOutResult<R> {
    pub records: Vec<R>,
    pub timezone_hint: Option<String>,
}

/// A configured weather provider. One variant per concrete client.
#[derive(Debug, Clone)]
pub enum ProviderClient {
    OpenWeatherMap(openweathermap::OpenWeatherMapClient),
    OpenMeteo(open_meteo::OpenMeteoClient),
    WeatherApi(weatherapi::WeatherApiClient),
}

impl ProviderClient {
    pub fn from_config(config: &ProviderConfig) -> Self {
        match config.id.as_str() {
            "openweathermap" => ProviderClient::OpenWeatherMap(
                openweathermap::OpenWeatherMapClient::new(&config.base_url, config.api_key.as_deref()),
            ),
            "open-meteo" => {
                ProviderClient::OpenMeteo(open_meteo::OpenMeteoClient::new(&config.base_url))
            }
            "weatherapi" => ProviderClient::WeatherApi(weatherapi::WeatherApiClient::new(
                &config.base_url,
                config.api_key.as_deref(),
            )),
            other => panic!("unknown provider id in configuration: {other}"),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ProviderClient::OpenWeatherMap(c) => c.id(),
            ProviderClient::OpenMeteo(c) => c.id(),
            ProviderClient::WeatherApi(c) => c.id(),
        }
    }

    pub async fn fetch_current(
        &self,
        location: &Location,
    ) -> Result<(NormalizedCurrent, Option<String>), ProviderError> {
        match self {
            ProviderClient::OpenWeatherMap(c) => c.fetch_current(location).await,
            ProviderClient::OpenMeteo(c) => c.fetch_current(location).await,
            ProviderClient::WeatherApi(c) => c.fetch_current(location).await,
        }
    }

    pub async fn fetch_hourly(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedHourly>, Option<String>), ProviderError> {
        match self {
            ProviderClient::OpenWeatherMap(c) => c.fetch_hourly(location).await,
            ProviderClient::OpenMeteo(c) => c.fetch_hourly(location).await,
            ProviderClient::WeatherApi(c) => c.fetch_hourly(location).await,
        }
    }

    pub async fn fetch_daily(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedDaily>, Option<String>), ProviderError> {
        match self {
            ProviderClient::OpenWeatherMap(c) => c.fetch_daily(location).await,
            ProviderClient::OpenMeteo(c) => c.fetch_daily(location).await,
            ProviderClient::WeatherApi(c) => c.fetch_daily(location).await,
        }
    }
}

fn first_hint(hints: impl Iterator<Item = Option<String>>) -> Option<String> {
    hints.flatten().next()
}

/// Fan out a current-weather request to every provider concurrently.
pub async fn fan_out_current(
    providers: &[ProviderClient],
    location: &Location,
) -> FanOutResult<NormalizedCurrent> {
    let fetches = providers.iter().map(|p| async move {
        match p.fetch_current(location).await {
            Ok((record, hint)) => Some((vec![record], hint)),
            Err(err) => {
                tracing::warn!(provider = p.id(), error = %err, "current weather fetch failed");
                None
            }
        }
    });
    let results = futures::future::join_all(fetches).await;
    let timezone_hint = first_hint(results.iter().flatten().map(|(_, h)| h.clone()));
    let records = results.into_iter().flatten().flat_map(|(r, _)| r).collect();
    FanOutResult {
        records,
        timezone_hint,
    }
}

/// Fan out an hourly-forecast request to every provider concurrently.
pub async fn fan_out_hourly(
    providers: &[ProviderClient],
    location: &Location,
) -> FanOutResult<NormalizedHourly> {
    let fetches = providers.iter().map(|p| async move {
        match p.fetch_hourly(location).await {
            Ok((records, hint)) => Some((records, hint)),
            Err(err) => {
                tracing::warn!(provider = p.id(), error = %err, "hourly forecast fetch failed");
                None
            }
        }
    });
    let results = futures::future::join_all(fetches).await;
    let timezone_hint = first_hint(results.iter().flatten().map(|(_, h)| h.clone()));
    let records = results.into_iter().flatten().flat_map(|(r, _)| r).collect();
    FanOutResult {
        records,
        timezone_hint,
    }
}

/// Fan out a daily-forecast request to every provider concurrently.
pub async fn fan_out_daily(
    providers: &[ProviderClient],
    location: &Location,
) -> FanOutResult<NormalizedDaily> {
    let fetches = providers.iter().map(|p| async move {
        match p.fetch_daily(location).await {
            Ok((records, hint)) => Some((records, hint)),
            Err(err) => {
                tracing::warn!(provider = p.id(), error = %err, "daily forecast fetch failed");
                None
            }
        }
    });
    let results = futures::future::join_all(fetches).await;
    let timezone_hint = first_hint(results.iter().flatten().map(|(_, h)| h.clone()));
    let records = results.into_iter().flatten().flat_map(|(r, _)| r).collect();
    FanOutResult {
        records,
        timezone_hint,
    }
}
