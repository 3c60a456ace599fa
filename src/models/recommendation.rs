use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{lenient_i32, null_as_default};

// ============================================================================
// Recommendation upstream request
// ============================================================================

/// Weather inputs the recommendation model scores against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub temperature: Option<f64>,
    pub feels_like_temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub humidity: Option<i32>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub precipitation_probability: Option<i32>,
}

/// A candidate clothing item offered to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationItem {
    pub clothing_id: Option<i64>,
    pub name: Option<String>,
    pub category: Option<String>,
}

/// Items may contain `null` entries; they are kept so the gateway can reject
/// them and the fallback can skip them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Option<RecommendationItem>>,
    #[serde(default)]
    pub weather: Option<WeatherSnapshot>,
}

// ============================================================================
// Recommendation upstream response
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub clothing_id: Option<i64>,
    #[serde(default, alias = "material_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub analysis: Option<String>,
}

/// Raw body returned by the recommendation service
///
/// `recommendations` stays an `Option` so a missing collection can be told
/// apart from an empty one; entries may themselves be `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub recommendations: Option<Vec<Option<Recommendation>>>,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Pipeline output
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Success,
    Fallback,
}

/// Why a result was produced without the model's ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    ReqNull,
    WeatherNull,
    ItemsEmpty,
    AiException,
    AiEmpty,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::ReqNull => "req_null",
            FallbackReason::WeatherNull => "weather_null",
            FallbackReason::ItemsEmpty => "items_empty",
            FallbackReason::AiException => "ai_exception",
            FallbackReason::AiEmpty => "ai_empty",
        }
    }
}

impl Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    pub clothing_id: i64,
    pub name: Option<String>,
    pub score: Option<f64>,
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub status: RecommendationStatus,
    pub recommendations: Vec<RankedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FallbackReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendationResult {
    pub fn success(recommendations: Vec<RankedItem>, message: Option<String>) -> Self {
        Self {
            status: RecommendationStatus::Success,
            recommendations,
            reason: None,
            message,
        }
    }

    pub fn fallback(reason: FallbackReason, recommendations: Vec<RankedItem>) -> Self {
        Self {
            status: RecommendationStatus::Fallback,
            recommendations,
            reason: Some(reason),
            message: Some(reason.as_str().to_string()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.status == RecommendationStatus::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_null_items() {
        let json = r#"{"items": null, "weather": {"temperature": 3.5, "humidity": 40}}"#;
        let request: RecommendationRequest = serde_json::from_str(json).unwrap();
        assert!(request.items.is_empty());
        let weather = request.weather.unwrap();
        assert_eq!(weather.temperature, Some(3.5));
        assert_eq!(weather.feels_like_temperature, None);
    }

    #[test]
    fn test_request_keeps_null_entries_and_coerces_float_integers() {
        let json = r#"{
            "items": [null, {"clothingId": 1, "name": "Tee", "category": "TOP"}],
            "weather": {"temperature": 20.0, "humidity": 55.5, "precipitationProbability": 10}
        }"#;
        let request: RecommendationRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.items.len(), 2);
        assert!(request.items[0].is_none());
        assert_eq!(request.items[1].as_ref().unwrap().clothing_id, Some(1));

        let weather = request.weather.unwrap();
        assert_eq!(weather.humidity, Some(55));
        assert_eq!(weather.precipitation_probability, Some(10));
    }

    #[test]
    fn test_request_rejects_non_numeric_humidity() {
        let json = r#"{"items": [], "weather": {"humidity": "wet"}}"#;
        assert!(serde_json::from_str::<RecommendationRequest>(json).is_err());
    }

    #[test]
    fn test_request_serializes_upstream_field_names() {
        let request = RecommendationRequest {
            items: vec![Some(RecommendationItem {
                clothing_id: Some(11),
                name: Some("Wool coat".to_string()),
                category: Some("OUTER".to_string()),
            })],
            weather: Some(WeatherSnapshot {
                temperature: Some(2.0),
                feels_like_temperature: Some(-1.0),
                humidity: Some(70),
                precipitation_probability: Some(30),
            }),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["items"][0]["clothingId"], 11);
        assert_eq!(json["weather"]["feelsLikeTemperature"], -1.0);
        assert_eq!(json["weather"]["precipitationProbability"], 30);
    }

    #[test]
    fn test_response_accepts_material_name_alias_and_null_entries() {
        let json = r#"{
            "status": "success",
            "recommendations": [
                {"clothingId": 1, "material_name": "Cotton", "score": 0.8},
                null,
                {"clothingId": 2, "name": "Fleece", "score": null, "analysis": "warm"}
            ]
        }"#;

        let response: RecommendationResponse = serde_json::from_str(json).unwrap();
        let recs = response.recommendations.unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].as_ref().unwrap().name.as_deref(), Some("Cotton"));
        assert!(recs[1].is_none());
        assert_eq!(recs[2].as_ref().unwrap().score, None);
    }

    #[test]
    fn test_response_missing_recommendations_is_none() {
        let response: RecommendationResponse =
            serde_json::from_str(r#"{"status": "success"}"#).unwrap();
        assert!(response.recommendations.is_none());
    }

    #[test]
    fn test_fallback_result_serialization() {
        let result = RecommendationResult::fallback(FallbackReason::ItemsEmpty, vec![]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "fallback");
        assert_eq!(json["reason"], "items_empty");
        assert_eq!(json["message"], "items_empty");
        assert!(json["recommendations"].as_array().unwrap().is_empty());
    }
}
