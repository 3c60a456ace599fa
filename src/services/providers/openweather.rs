//! OpenWeather 5 day / 3 hour forecast provider
//!
//! Calls `GET <api_url>?lat=..&lon=..&appid=..&units=metric` and hands the
//! sample list back untouched.

use crate::{
    error::{AppError, AppResult},
    models::{Coordinates, ForecastResponse, ForecastSample},
    services::providers::ForecastProvider,
};
use reqwest::Client as HttpClient;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct OpenWeatherProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
        })
    }

    fn api_key(&self) -> AppResult<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            tracing::error!("OPENWEATHER_API_KEY is not set");
            return Err(AppError::Internal(
                "OpenWeather API key is not configured".to_string(),
            ));
        }
        Ok(key)
    }

    async fn call(&self, coordinates: Coordinates) -> AppResult<Vec<ForecastSample>> {
        let api_key = self.api_key()?;

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("lat", coordinates.lat.to_string()),
                ("lon", coordinates.lon.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "OpenWeather API returned status {}: {}",
                status, body
            )));
        }

        let forecast: ForecastResponse = response.json().await?;

        let cod = forecast.status_code();
        if cod != "200" {
            return Err(AppError::ExternalApi(format!(
                "OpenWeather forecast error (cod={}, message={})",
                cod, forecast.message
            )));
        }

        if forecast.list.is_empty() {
            return Err(AppError::ExternalApi(
                "OpenWeather forecast returned no samples".to_string(),
            ));
        }

        Ok(forecast.list)
    }
}

#[async_trait::async_trait]
impl ForecastProvider for OpenWeatherProvider {
    async fn fetch_forecast(&self, coordinates: Coordinates) -> AppResult<Vec<ForecastSample>> {
        let started = Instant::now();
        let result = self.call(coordinates).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(samples) => tracing::info!(
                lat = coordinates.lat,
                lon = coordinates.lon,
                samples = samples.len(),
                elapsed_ms,
                "OpenWeather forecast fetched"
            ),
            Err(e) => tracing::error!(
                lat = coordinates.lat,
                lon = coordinates.lon,
                elapsed_ms,
                error = %e,
                "OpenWeather forecast call failed"
            ),
        }

        result
    }

    fn name(&self) -> &'static str {
        "openweather"
    }
}
