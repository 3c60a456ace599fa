use crate::{
    config::DefaultLocation,
    models::Coordinates,
    services::{ComfortClient, RecommendationPipeline, RecommendationService, WeatherService},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub weather: WeatherService,
    pub recommendations: RecommendationService,
    pub pipeline: RecommendationPipeline,
    pub comfort: ComfortClient,
    pub default_location: DefaultLocation,
}

impl AppState {
    pub fn new(
        weather: WeatherService,
        recommendations: RecommendationService,
        pipeline: RecommendationPipeline,
        comfort: ComfortClient,
        default_location: DefaultLocation,
    ) -> Self {
        Self {
            weather,
            recommendations,
            pipeline,
            comfort,
            default_location,
        }
    }

    /// Fills in the configured region and coordinates where a request
    /// leaves them out. Coordinates are only taken when both are given.
    pub fn resolve_location(
        &self,
        region: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> (String, Coordinates) {
        let region = region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_location.region)
            .to_string();

        let coordinates = match (lat, lon) {
            (Some(lat), Some(lon)) => Coordinates { lat, lon },
            _ => self.default_location.coordinates,
        };

        (region, coordinates)
    }
}
