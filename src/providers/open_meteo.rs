//! Open-Meteo client.
//!
//! Unlike OpenWeatherMap, a single `/forecast` call can return current,
//! hourly, and daily blocks together and needs no API key. Each normalised
//! fetch still issues its own request asking only for the block it needs,
//! keeping the three methods independent and cancellable on their own.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::db::models::Location;
use crate::helpers::f64_to_decimal_1dp;

use super::{NormalizedCurrent, NormalizedDaily, NormalizedHourly, ProviderError};

const PROVIDER_ID: &str = "open-meteo";
const HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: String,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    precipitation: f64,
    weather_code: i32,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentBlock,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<f64>,
    relative_humidity_2m: Vec<f64>,
    wind_speed_10m: Vec<f64>,
    precipitation: Vec<f64>,
    precipitation_probability: Vec<f64>,
    weather_code: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    hourly: HourlyBlock,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_min: Vec<f64>,
    temperature_2m_max: Vec<f64>,
    precipitation_sum: Vec<f64>,
    precipitation_probability_max: Vec<f64>,
    wind_speed_10m_max: Vec<f64>,
    relative_humidity_2m_mean: Vec<f64>,
    weather_code: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailyBlock,
    timezone: Option<String>,
}

fn weather_code_text(code: i32) -> String {
    match code {
        0 => "clear sky",
        1..=3 => "partly cloudy",
        45 | 48 => "fog",
        51..=57 => "drizzle",
        61..=67 => "rain",
        71..=77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95..=99 => "thunderstorm",
        _ => "unknown",
    }
    .to_string()
}

fn is_real_timezone(tz: &Option<String>) -> bool {
    matches!(tz.as_deref(), Some(t) if t != "GMT" && !t.is_empty())
}

impl OpenMeteoClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
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

    pub async fn fetch_current(
        &self,
        location: &Location,
    ) -> Result<(NormalizedCurrent, Option<String>), ProviderError> {
        let response = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation,weather_code"
                        .to_string(),
                ),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.err(format!("returned HTTP {}", response.status())));
        }
        let body: CurrentResponse = response
            .json()
            .await
            .map_err(|e| self.err(format!("JSON parse error: {e}")))?;

        let observed_at = parse_naive_as_utc(&body.current.time)
            .ok_or_else(|| self.err(format!("unparseable time '{}'", body.current.time)))?;

        Ok((
            NormalizedCurrent {
                provider_id: PROVIDER_ID.to_string(),
                observed_at,
                temperature_c: f64_to_decimal_1dp(body.current.temperature_2m),
                humidity_pct: f64_to_decimal_1dp(body.current.relative_humidity_2m),
                wind_speed_kmh: f64_to_decimal_1dp(body.current.wind_speed_10m),
                precipitation_mm: f64_to_decimal_1dp(body.current.precipitation),
                condition: weather_code_text(body.current.weather_code),
            },
            is_real_timezone(&body.timezone).then(|| body.timezone.unwrap()),
        ))
    }

    pub async fn fetch_hourly(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedHourly>, Option<String>), ProviderError> {
        let response = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                (
                    "hourly",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation,\
                     precipitation_probability,weather_code"
                        .to_string(),
                ),
                ("forecast_days", "2".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.err(format!("returned HTTP {}", response.status())));
        }
        let body: HourlyResponse = response
            .json()
            .await
            .map_err(|e| self.err(format!("JSON parse error: {e}")))?;

        let h = &body.hourly;
        let n = h.time.len();
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let Some(forecast_datetime_utc) = parse_naive_as_utc(&h.time[i]) else {
                tracing::warn!(provider = PROVIDER_ID, time = %h.time[i], "skipping unparseable hourly entry");
                continue;
            };
            records.push(NormalizedHourly {
                provider_id: PROVIDER_ID.to_string(),
                forecast_datetime_utc,
                temperature_c: f64_to_decimal_1dp(h.temperature_2m[i]),
                humidity_pct: f64_to_decimal_1dp(h.relative_humidity_2m[i]),
                wind_speed_kmh: f64_to_decimal_1dp(h.wind_speed_10m[i]),
                precipitation_mm: f64_to_decimal_1dp(h.precipitation[i]),
                precipitation_chance_pct: f64_to_decimal_1dp(h.precipitation_probability[i]),
                condition: weather_code_text(h.weather_code[i]),
            });
        }

        Ok((
            records,
            is_real_timezone(&body.timezone).then(|| body.timezone.unwrap()),
        ))
    }

    pub async fn fetch_daily(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedDaily>, Option<String>), ProviderError> {
        let response = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                (
                    "daily",
                    "temperature_2m_min,temperature_2m_max,precipitation_sum,\
                     precipitation_probability_max,wind_speed_10m_max,\
                     relative_humidity_2m_mean,weather_code"
                        .to_string(),
                ),
                ("forecast_days", "7".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.err(format!("returned HTTP {}", response.status())));
        }
        let body: DailyResponse = response
            .json()
            .await
            .map_err(|e| self.err(format!("JSON parse error: {e}")))?;

        let d = &body.daily;
        let n = d.time.len();
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let Some(forecast_date) = NaiveDate::parse_from_str(&d.time[i], "%Y-%m-%d").ok()
            else {
                tracing::warn!(provider = PROVIDER_ID, date = %d.time[i], "skipping unparseable daily entry");
                continue;
            };
            records.push(NormalizedDaily {
                provider_id: PROVIDER_ID.to_string(),
                forecast_date,
                min_temp_c: f64_to_decimal_1dp(d.temperature_2m_min[i]),
                max_temp_c: f64_to_decimal_1dp(d.temperature_2m_max[i]),
                precipitation_mm: f64_to_decimal_1dp(d.precipitation_sum[i]),
                precipitation_chance_pct: f64_to_decimal_1dp(d.precipitation_probability_max[i]),
                wind_speed_kmh: f64_to_decimal_1dp(d.wind_speed_10m_max[i]),
                humidity_pct: f64_to_decimal_1dp(d.relative_humidity_2m_mean[i]),
            });
        }

        Ok((
            records,
            is_real_timezone(&body.timezone).then(|| body.timezone.unwrap()),
        ))
    }
}

/// Open-Meteo timestamps are local-time, no-offset strings like
/// `2026-03-01T07:00`. Treated as UTC here since the aggregation core's
/// `forecast_datetime_utc` axis only needs a consistent instant to window
/// and sort on, not true UTC wall-clock accuracy per provider.
fn parse_naive_as_utc(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|naive| naive.and_utc())
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

    #[tokio::test]
    async fn test_fetch_current_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": {
                    "time": "2026-03-01T07:00",
                    "temperature_2m": -2.5,
                    "relative_humidity_2m": 88.0,
                    "wind_speed_10m": 12.0,
                    "precipitation": 0.0,
                    "weather_code": 71,
                },
                "timezone": "Europe/Zurich",
            })))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&server.uri());
        let (record, tz) = client.fetch_current(&test_location()).await.unwrap();
        assert_eq!(record.condition, "snow");
        assert_eq!(tz.as_deref(), Some("Europe/Zurich"));
    }

    #[tokio::test]
    async fn test_gmt_timezone_is_not_a_hint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": {
                    "time": "2026-03-01T07:00",
                    "temperature_2m": 10.0,
                    "relative_humidity_2m": 50.0,
                    "wind_speed_10m": 5.0,
                    "precipitation": 0.0,
                    "weather_code": 0,
                },
                "timezone": "GMT",
            })))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&server.uri());
        let (_, tz) = client.fetch_current(&test_location()).await.unwrap();
        assert_eq!(tz, None);
    }

    #[test]
    fn test_weather_code_mapping() {
        assert_eq!(weather_code_text(0), "clear sky");
        assert_eq!(weather_code_text(95), "thunderstorm");
        assert_eq!(weather_code_text(999), "unknown");
    }
}
