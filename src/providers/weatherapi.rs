//! WeatherAPI.com client.
//!
//! Single `/forecast.json` endpoint covers current, hourly, and daily data
//! at once, keyed by `days`. Each normalised method still issues its own
//! request so one provider's hourly call can fail independently of its
//! daily call during fan-out.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::db::models::Location;
use crate::helpers::f64_to_decimal_1dp;

use super::{NormalizedCurrent, NormalizedDaily, NormalizedHourly, ProviderError};

const PROVIDER_ID: &str = "weatherapi";
const HTTP_TIMEOUT_SECS: u64 = 15;
const FORECAST_DAYS: u32 = 3;

#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    last_updated_epoch: i64,
    temp_c: f64,
    humidity: f64,
    wind_kph: f64,
    precip_mm: f64,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct HourBlock {
    time_epoch: i64,
    temp_c: f64,
    humidity: f64,
    wind_kph: f64,
    precip_mm: f64,
    chance_of_rain: f64,
    chance_of_snow: f64,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct DayBlock {
    mintemp_c: f64,
    maxtemp_c: f64,
    totalprecip_mm: f64,
    daily_chance_of_rain: f64,
    daily_chance_of_snow: f64,
    maxwind_kph: f64,
    avghumidity: f64,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct ForecastDayEntry {
    date: String,
    day: DayBlock,
    hour: Vec<HourBlock>,
}

#[derive(Debug, Deserialize)]
struct ForecastBlock {
    forecastday: Vec<ForecastDayEntry>,
}

#[derive(Debug, Deserialize)]
struct LocationBlock {
    tz_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherApiResponse {
    location: LocationBlock,
    current: CurrentBlock,
    forecast: ForecastBlock,
}

fn epoch_to_utc(epoch: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
}

fn precip_chance(rain: f64, snow: f64) -> f64 {
    rain.max(snow)
}

impl WeatherApiClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    pub fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn err(&self, message: impl Into<String>) -> ProviderError {
        ProviderError {
            provider_id: PROVIDER_ID.to_string(),
            message: message.into(),
        }
    }

    async fn fetch_forecast(
        &self,
        location: &Location,
    ) -> Result<WeatherApiResponse, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| self.err("missing API key"))?;

        let response = self
            .client
            .get(format!("{}/forecast.json", self.base_url))
            .query(&[
                ("key", key.to_string()),
                (
                    "q",
                    format!("{},{}", location.latitude, location.longitude),
                ),
                ("days", FORECAST_DAYS.to_string()),
                ("aqi", "no".to_string()),
                ("alerts", "no".to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.err(format!("returned HTTP {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|e| self.err(format!("JSON parse error: {e}")))
    }

    pub async fn fetch_current(
        &self,
        location: &Location,
    ) -> Result<(NormalizedCurrent, Option<String>), ProviderError> {
        let body = self.fetch_forecast(location).await?;
        let observed_at = epoch_to_utc(body.current.last_updated_epoch)
            .ok_or_else(|| self.err("unparseable last_updated_epoch"))?;

        Ok((
            NormalizedCurrent {
                provider_id: PROVIDER_ID.to_string(),
                observed_at,
                temperature_c: f64_to_decimal_1dp(body.current.temp_c),
                humidity_pct: f64_to_decimal_1dp(body.current.humidity),
                wind_speed_kmh: f64_to_decimal_1dp(body.current.wind_kph),
                precipitation_mm: f64_to_decimal_1dp(body.current.precip_mm),
                condition: body.current.condition.text,
            },
            body.location.tz_id,
        ))
    }

    pub async fn fetch_hourly(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedHourly>, Option<String>), ProviderError> {
        let body = self.fetch_forecast(location).await?;
        let mut records = Vec::new();
        for day in &body.forecast.forecastday {
            for hour in &day.hour {
                let Some(forecast_datetime_utc) = epoch_to_utc(hour.time_epoch) else {
                    tracing::warn!(
                        provider = PROVIDER_ID,
                        epoch = hour.time_epoch,
                        "skipping unparseable hourly entry"
                    );
                    continue;
                };
                records.push(NormalizedHourly {
                    provider_id: PROVIDER_ID.to_string(),
                    forecast_datetime_utc,
                    temperature_c: f64_to_decimal_1dp(hour.temp_c),
                    humidity_pct: f64_to_decimal_1dp(hour.humidity),
                    wind_speed_kmh: f64_to_decimal_1dp(hour.wind_kph),
                    precipitation_mm: f64_to_decimal_1dp(hour.precip_mm),
                    precipitation_chance_pct: f64_to_decimal_1dp(precip_chance(
                        hour.chance_of_rain,
                        hour.chance_of_snow,
                    )),
                    condition: hour.condition.text.clone(),
                });
            }
        }
        Ok((records, body.location.tz_id))
    }

    pub async fn fetch_daily(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedDaily>, Option<String>), ProviderError> {
        let body = self.fetch_forecast(location).await?;
        let mut records = Vec::new();
        for day in &body.forecast.forecastday {
            let Ok(forecast_date) = NaiveDate::parse_from_str(&day.date, "%Y-%m-%d") else {
                tracing::warn!(provider = PROVIDER_ID, date = %day.date, "skipping unparseable daily entry");
                continue;
            };
            records.push(NormalizedDaily {
                provider_id: PROVIDER_ID.to_string(),
                forecast_date,
                min_temp_c: f64_to_decimal_1dp(day.day.mintemp_c),
                max_temp_c: f64_to_decimal_1dp(day.day.maxtemp_c),
                precipitation_mm: f64_to_decimal_1dp(day.day.totalprecip_mm),
                precipitation_chance_pct: f64_to_decimal_1dp(precip_chance(
                    day.day.daily_chance_of_rain,
                    day.day.daily_chance_of_snow,
                )),
                wind_speed_kmh: f64_to_decimal_1dp(day.day.maxwind_kph),
                humidity_pct: f64_to_decimal_1dp(day.day.avghumidity),
            });
        }
        Ok((records, body.location.tz_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_location() -> Location {
        Location {
            id: uuid::Uuid::new_v4(),
            canonical_name: "Zurich".to_string(),
            country_code: "CH".to_string(),
            latitude: 47.37,
            longitude: 8.54,
            timezone: None,
        }
    }

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "location": {"tz_id": "Europe/Zurich"},
            "current": {
                "last_updated_epoch": 1_772_000_000i64,
                "temp_c": -1.0,
                "humidity": 80.0,
                "wind_kph": 10.0,
                "precip_mm": 0.2,
                "condition": {"text": "Light snow"},
            },
            "forecast": {
                "forecastday": [
                    {
                        "date": "2026-03-01",
                        "day": {
                            "mintemp_c": -5.0,
                            "maxtemp_c": 2.0,
                            "totalprecip_mm": 1.5,
                            "daily_chance_of_rain": 10.0,
                            "daily_chance_of_snow": 60.0,
                            "maxwind_kph": 15.0,
                            "avghumidity": 85.0,
                            "condition": {"text": "Snow"},
                        },
                        "hour": [
                            {
                                "time_epoch": 1_772_000_000i64,
                                "temp_c": -1.0,
                                "humidity": 80.0,
                                "wind_kph": 10.0,
                                "precip_mm": 0.1,
                                "chance_of_rain": 5.0,
                                "chance_of_snow": 50.0,
                                "condition": {"text": "Snow"},
                            }
                        ],
                    }
                ]
            },
        })
    }

    #[tokio::test]
    async fn test_fetch_current_requires_api_key() {
        let client = WeatherApiClient::new("http://localhost:1", None);
        let err = client.fetch_current(&test_location()).await.unwrap_err();
        assert!(err.message.contains("API key"));
    }

    #[tokio::test]
    async fn test_fetch_current_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let client = WeatherApiClient::new(&server.uri(), Some("test-key"));
        let (record, tz) = client.fetch_current(&test_location()).await.unwrap();
        assert_eq!(record.condition, "Light snow");
        assert_eq!(tz.as_deref(), Some("Europe/Zurich"));
    }

    #[tokio::test]
    async fn test_fetch_daily_picks_higher_precip_chance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let client = WeatherApiClient::new(&server.uri(), Some("test-key"));
        let (records, _) = client.fetch_daily(&test_location()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].precipitation_chance_pct, f64_to_decimal_1dp(60.0));
    }

    #[test]
    fn test_precip_chance_takes_max() {
        assert_eq!(precip_chance(10.0, 60.0), 60.0);
        assert_eq!(precip_chance(70.0, 20.0), 70.0);
    }
}
