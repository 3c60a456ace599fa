use crate::{
    error::AppResult,
    models::{Coordinates, ForecastSample},
};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Source of short-interval forecast samples
///
/// Implementations return the raw samples for a location; turning them into
/// daily records is the aggregator's job. An empty or malformed payload is an
/// error, never an empty success.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch_forecast(&self, coordinates: Coordinates) -> AppResult<Vec<ForecastSample>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
