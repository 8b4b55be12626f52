//! Geocoder adapter.
//!
//! Forward (name → coordinates) and reverse (coordinates → name) lookup.
//! No geocoding crate appears anywhere in this stack's dependency family, so
//! this is a hand-built `reqwest` client, built the same way every other
//! outbound HTTP collaborator in this codebase is: a cloneable client with a
//! bounded timeout and typed response structs.

use std::time::Duration;

use serde::Deserialize;

use crate::errors::AppError;

const GEOCODER_HTTP_TIMEOUT_SECS: u64 = 10;

/// A resolved place: canonical name, country, and coordinates.
#[derive(Debug, Clone)]
pub struct GeocodedPlace {
    pub canonical_name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct GeocoderClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    name: String,
    country: String,
    lat: f64,
    lon: f64,
}

impl GeocoderClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(GEOCODER_HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    /// Forward lookup: free-form city name → canonical place.
    pub async fn forward(&self, query: &str) -> Result<GeocodedPlace, AppError> {
        let mut req = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("limit", "1")]);
        if let Some(key) = &self.api_key {
            req = req.query(&[("key", key.as_str())]);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AppError::GeocodeFailed(format!("geocoder request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::GeocodeFailed(format!(
                "geocoder returned HTTP {}",
                response.status()
            )));
        }

        let results: Vec<GeocodeResult> = response
            .json()
            .await
            .map_err(|e| AppError::GeocodeFailed(format!("geocoder JSON parse error: {e}")))?;

        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::GeocodeFailed(format!("no results for '{query}'")))?;

        Ok(GeocodedPlace {
            canonical_name: first.name,
            country_code: first.country,
            latitude: first.lat,
            longitude: first.lon,
        })
    }

    /// Reverse lookup: coordinates → canonical place.
    pub async fn reverse(&self, lat: f64, lon: f64) -> Result<GeocodedPlace, AppError> {
        let mut req = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[("lat", lat.to_string()), ("lon", lon.to_string())]);
        if let Some(key) = &self.api_key {
            req = req.query(&[("key", key.as_str())]);
        }

        let response = req.send().await.map_err(|e| {
            AppError::GeocodeFailed(format!("reverse geocoder request failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(AppError::GeocodeFailed(format!(
                "reverse geocoder returned HTTP {}",
                response.status()
            )));
        }

        let results: Vec<GeocodeResult> = response.json().await.map_err(|e| {
            AppError::GeocodeFailed(format!("reverse geocoder JSON parse error: {e}"))
        })?;

        let first = results.into_iter().next().ok_or_else(|| {
            AppError::GeocodeFailed(format!("no results for ({lat}, {lon})"))
        })?;

        Ok(GeocodedPlace {
            canonical_name: first.name,
            country_code: first.country,
            latitude: first.lat,
            longitude: first.lon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_forward_parses_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Wroclaw", "country": "PL", "lat": 51.1, "lon": 17.03}
            ])))
            .mount(&server)
            .await;

        let client = GeocoderClient::new(&server.uri(), None);
        let place = client.forward("Wroclaw").await.unwrap();
        assert_eq!(place.canonical_name, "Wroclaw");
        assert_eq!(place.country_code, "PL");
    }

    #[tokio::test]
    async fn test_forward_empty_results_is_geocode_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = GeocoderClient::new(&server.uri(), None);
        let err = client.forward("Atlantis").await.unwrap_err();
        assert!(matches!(err, AppError::GeocodeFailed(_)));
    }

    #[tokio::test]
    async fn test_forward_http_error_is_geocode_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GeocoderClient::new(&server.uri(), None);
        let err = client.forward("Wroclaw").await.unwrap_err();
        assert!(matches!(err, AppError::GeocodeFailed(_)));
    }

    #[tokio::test]
    async fn test_reverse_parses_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Zurich", "country": "CH", "lat": 47.37, "lon": 8.54}
            ])))
            .mount(&server)
            .await;

        let client = GeocoderClient::new(&server.uri(), None);
        let place = client.reverse(47.37, 8.54).await.unwrap();
        assert_eq!(place.canonical_name, "Zurich");
    }
}
