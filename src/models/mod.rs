use serde::{Deserialize, Deserializer};

pub mod audit;
pub mod clothing;
pub mod comfort;
pub mod recommendation;
pub mod weather;

pub use audit::{AuditEvent, AuditEventType};
pub use clothing::{ClothingCandidate, ClothingCategory};
pub use comfort::{ComfortContext, ComfortItem, ComfortRequest, ComfortResponse, ComfortResult};
pub use recommendation::{
    FallbackReason, RankedItem, Recommendation, RecommendationItem, RecommendationRequest,
    RecommendationResponse, RecommendationResult, RecommendationStatus, WeatherSnapshot,
};
pub use weather::{
    Coordinates, DailyAggregate, DailyWeather, ForecastClouds, ForecastCondition, ForecastMain,
    ForecastResponse, ForecastSample, ForecastWind, WeeklyWeather,
};

/// Reads an optional integer that may arrive as a JSON float, truncating
/// toward zero
pub(crate) fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(v) if v.is_finite() && v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) => {
            Ok(Some(v.trunc() as i32))
        }
        Some(v) => Err(serde::de::Error::custom(format!(
            "{} is not a valid integer",
            v
        ))),
    }
}

/// Treats an explicit JSON `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
