//! OpenWeatherMap client.
//!
//! Uses the free `/weather` (current) and `/forecast` (3-hourly, 5 days)
//! endpoints — the paid One Call API is not assumed. Hourly records are the
//! 3-hour slices returned as-is; daily records are derived by grouping those
//! slices by UTC calendar date and taking min/max temperature across the day.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::models::Location;
use crate::helpers::f64_to_decimal_1dp;

use super::{NormalizedCurrent, NormalizedDaily, NormalizedHourly, ProviderError};

const PROVIDER_ID: &str = "openweathermap";
const HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmWeatherDesc {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize, Default)]
struct OwmRain {
    #[serde(rename = "1h", default)]
    one_hour: f64,
    #[serde(rename = "3h", default)]
    three_hour: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCurrentResponse {
    dt: i64,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    #[serde(default)]
    rain: Option<OwmRain>,
    weather: Vec<OwmWeatherDesc>,
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastEntry {
    dt: i64,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    #[serde(default)]
    rain: Option<OwmRain>,
    #[serde(default)]
    pop: f64,
    weather: Vec<OwmWeatherDesc>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastEntry>,
}

fn condition_text(weather: &[OwmWeatherDesc]) -> String {
    weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

fn precip_mm(rain: &Option<OwmRain>, prefer_three_hour: bool) -> f64 {
    match rain {
        Some(r) if prefer_three_hour => r.three_hour,
        Some(r) => r.one_hour,
        None => 0.0,
    }
}

impl OpenWeatherMapClient {
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

    pub async fn fetch_current(
        &self,
        location: &Location,
    ) -> Result<(NormalizedCurrent, Option<String>), ProviderError> {
        let mut req = self.client.get(format!("{}/weather", self.base_url)).query(&[
            ("lat", location.latitude.to_string()),
            ("lon", location.longitude.to_string()),
            ("units", "metric".to_string()),
        ]);
        if let Some(key) = &self.api_key {
            req = req.query(&[("appid", key.as_str())]);
        }

        let response = req
            .send()
            .await
            .map_err(|e| self.err(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(self.err(format!("returned HTTP {}", response.status())));
        }
        let body: OwmCurrentResponse = response
            .json()
            .await
            .map_err(|e| self.err(format!("JSON parse error: {e}")))?;

        let observed_at = DateTime::<Utc>::from_timestamp(body.dt, 0)
            .ok_or_else(|| self.err("dt field out of range"))?;
        let timezone_hint = body.timezone.map(|offset_secs| {
            chrono_tz_offset_label(offset_secs)
        });

        Ok((
            NormalizedCurrent {
                provider_id: PROVIDER_ID.to_string(),
                observed_at,
                temperature_c: f64_to_decimal_1dp(body.main.temp),
                humidity_pct: f64_to_decimal_1dp(body.main.humidity),
                wind_speed_kmh: f64_to_decimal_1dp(body.wind.speed * 3.6),
                precipitation_mm: f64_to_decimal_1dp(precip_mm(&body.rain, false)),
                condition: condition_text(&body.weather),
            },
            timezone_hint,
        ))
    }

    pub async fn fetch_hourly(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedHourly>, Option<String>), ProviderError> {
        let entries = self.fetch_forecast_list(location).await?;
        let records = entries
            .into_iter()
            .filter_map(|e| {
                DateTime::<Utc>::from_timestamp(e.dt, 0).map(|forecast_datetime_utc| {
                    NormalizedHourly {
                        provider_id: PROVIDER_ID.to_string(),
                        forecast_datetime_utc,
                        temperature_c: f64_to_decimal_1dp(e.main.temp),
                        humidity_pct: f64_to_decimal_1dp(e.main.humidity),
                        wind_speed_kmh: f64_to_decimal_1dp(e.wind.speed * 3.6),
                        precipitation_mm: f64_to_decimal_1dp(precip_mm(&e.rain, true)),
                        precipitation_chance_pct: f64_to_decimal_1dp(e.pop * 100.0),
                        condition: condition_text(&e.weather),
                    }
                })
            })
            .collect();
        Ok((records, None))
    }

    pub async fn fetch_daily(
        &self,
        location: &Location,
    ) -> Result<(Vec<NormalizedDaily>, Option<String>), ProviderError> {
        let entries = self.fetch_forecast_list(location).await?;

        let mut by_day: BTreeMap<NaiveDate, Vec<&OwmForecastEntry>> = BTreeMap::new();
        let mut dated: Vec<(NaiveDate, OwmForecastEntry)> = Vec::new();
        for e in entries {
            if let Some(dt) = DateTime::<Utc>::from_timestamp(e.dt, 0) {
                dated.push((dt.date_naive(), e));
            }
        }
        for (date, entry) in &dated {
            by_day.entry(*date).or_default().push(entry);
        }

        let records = by_day
            .into_iter()
            .map(|(forecast_date, entries)| {
                let temps: Vec<f64> = entries.iter().map(|e| e.main.temp).collect();
                let min_temp = temps.iter().cloned().fold(f64::INFINITY, f64::min);
                let max_temp = temps.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let humidity_avg =
                    entries.iter().map(|e| e.main.humidity).sum::<f64>() / entries.len() as f64;
                let wind_avg = entries.iter().map(|e| e.wind.speed * 3.6).sum::<f64>()
                    / entries.len() as f64;
                let precip_total: f64 = entries.iter().map(|e| precip_mm(&e.rain, true)).sum();
                let pop_max = entries.iter().map(|e| e.pop).fold(0.0, f64::max);
                NormalizedDaily {
                    provider_id: PROVIDER_ID.to_string(),
                    forecast_date,
                    min_temp_c: f64_to_decimal_1dp(min_temp),
                    max_temp_c: f64_to_decimal_1dp(max_temp),
                    precipitation_mm: f64_to_decimal_1dp(precip_total),
                    precipitation_chance_pct: f64_to_decimal_1dp(pop_max * 100.0),
                    wind_speed_kmh: f64_to_decimal_1dp(wind_avg),
                    humidity_pct: f64_to_decimal_1dp(humidity_avg),
                }
            })
            .collect();

        Ok((records, None))
    }

    async fn fetch_forecast_list(
        &self,
        location: &Location,
    ) -> Result<Vec<OwmForecastEntry>, ProviderError> {
        let mut req = self.client.get(format!("{}/forecast", self.base_url)).query(&[
            ("lat", location.latitude.to_string()),
            ("lon", location.longitude.to_string()),
            ("units", "metric".to_string()),
        ]);
        if let Some(key) = &self.api_key {
            req = req.query(&[("appid", key.as_str())]);
        }

        let response = req
            .send()
            .await
            .map_err(|e| self.err(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(self.err(format!("returned HTTP {}", response.status())));
        }
        let body: OwmForecastResponse = response
            .json()
            .await
            .map_err(|e| self.err(format!("JSON parse error: {e}")))?;
        Ok(body.list)
    }
}

/// OpenWeatherMap's `timezone` field is a UTC offset in seconds. The
/// aggregation core only needs *some* IANA-ish hint to fill in a missing
/// Location timezone; a fixed-offset label is the best this provider gives us.
fn chrono_tz_offset_label(offset_secs: i32) -> String {
    let sign = if offset_secs < 0 { "-" } else { "+" };
    let abs = offset_secs.unsigned_abs();
    format!("UTC{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_location() -> Location {
        Location {
            id: uuid::Uuid::new_v4(),
            canonical_name: "Wroclaw".to_string(),
            country_code: "PL".to_string(),
            latitude: 51.1,
            longitude: 17.03,
            timezone: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_current_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dt": 1_700_000_000i64,
                "main": {"temp": 5.5, "humidity": 80.0},
                "wind": {"speed": 3.0},
                "weather": [{"description": "light rain"}],
                "timezone": 3600,
            })))
            .mount(&server)
            .await;

        let client = OpenWeatherMapClient::new(&server.uri(), Some("testkey"));
        let (record, tz) = client.fetch_current(&test_location()).await.unwrap();
        assert_eq!(record.condition, "light rain");
        assert_eq!(tz.as_deref(), Some("UTC+01:00"));
    }

    #[tokio::test]
    async fn test_fetch_current_http_error_tags_provider_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = OpenWeatherMapClient::new(&server.uri(), None);
        let err = client.fetch_current(&test_location()).await.unwrap_err();
        assert_eq!(err.provider_id, PROVIDER_ID);
    }

    #[tokio::test]
    async fn test_fetch_daily_groups_by_calendar_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [
                    {"dt": 1_700_000_000i64, "main": {"temp": 2.0, "humidity": 70.0}, "wind": {"speed": 1.0}, "pop": 0.1, "weather": [{"description": "clear sky"}]},
                    {"dt": 1_700_010_800i64, "main": {"temp": 6.0, "humidity": 75.0}, "wind": {"speed": 2.0}, "pop": 0.4, "weather": [{"description": "overcast"}]},
                ]
            })))
            .mount(&server)
            .await;

        let client = OpenWeatherMapClient::new(&server.uri(), None);
        let (days, _) = client.fetch_daily(&test_location()).await.unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].min_temp_c, Decimal::new(20, 1));
        assert_eq!(days[0].max_temp_c, Decimal::new(60, 1));
    }
}
