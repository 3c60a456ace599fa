use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Ambient conditions shared by every item in a comfort batch
///
/// Fields are optional on the way in; the gateway repairs missing or
/// non-finite values before anything is sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfortContext {
    /// Air temperature
    #[serde(rename = "Ta")]
    pub ta: Option<f64>,
    /// Relative humidity
    #[serde(rename = "RH")]
    pub rh: Option<f64>,
    /// Air velocity
    #[serde(rename = "Va")]
    pub va: Option<f64>,
    pub cloud: Option<f64>,
}

/// One item with its cotton/polyester composition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfortItem {
    pub item_id: Option<i64>,
    pub c_ratio: Option<i32>,
    pub p_ratio: Option<i32>,
}

/// `null` item entries survive decoding and are rejected by validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfortRequest {
    #[serde(default)]
    pub context: Option<ComfortContext>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Option<ComfortItem>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfortResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<ComfortResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfortResult {
    pub item_id: Option<i64>,
    #[serde(default)]
    pub comfort_score: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_uses_upstream_field_names() {
        let context = ComfortContext {
            ta: Some(21.0),
            rh: Some(45.0),
            va: Some(0.3),
            cloud: Some(0.5),
        };
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["Ta"], 21.0);
        assert_eq!(json["RH"], 45.0);
        assert_eq!(json["Va"], 0.3);
        assert_eq!(json["cloud"], 0.5);
    }

    #[test]
    fn test_request_keeps_null_items() {
        let json = r#"{"context": {"Ta": 20.0}, "items": [null, {"item_id": 3}]}"#;
        let request: ComfortRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.items.len(), 2);
        assert!(request.items[0].is_none());
        assert_eq!(request.items[1].as_ref().unwrap().item_id, Some(3));
    }

    #[test]
    fn test_response_null_results_become_empty() {
        let response: ComfortResponse = serde_json::from_str(r#"{"results": null}"#).unwrap();
        assert!(response.results.is_empty());

        let response: ComfortResponse = serde_json::from_str("{}").unwrap();
        assert!(response.results.is_empty());
    }
}
