use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::null_as_default;

/// A point on the map used to query the forecast provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// One day of weather for one region, as held by the backing store
///
/// `(region, date)` is the natural key: the store never holds two rows for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyWeather {
    #[serde(skip)]
    pub id: Option<i64>,
    pub region: String,
    #[sqlx(rename = "weather_date")]
    pub date: NaiveDate,
    pub temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub feels_like_temperature: f64,
    /// Cloud cover, 0..=100
    pub cloud_amount: i32,
    pub sky: String,
    /// 0..=100
    pub precipitation_probability: i32,
    /// 0..=100
    pub humidity: i32,
    pub wind_speed: f64,
    pub fetched_at: DateTime<Utc>,
}

impl DailyWeather {
    /// Builds a new, not yet persisted record from a daily aggregate
    pub fn from_aggregate(aggregate: DailyAggregate, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            region: aggregate.region,
            date: aggregate.date,
            temperature: aggregate.temperature,
            min_temperature: aggregate.min_temperature,
            max_temperature: aggregate.max_temperature,
            feels_like_temperature: aggregate.feels_like_temperature,
            cloud_amount: aggregate.cloud_amount,
            sky: aggregate.sky,
            precipitation_probability: aggregate.precipitation_probability,
            humidity: aggregate.humidity,
            wind_speed: aggregate.wind_speed,
            fetched_at,
        }
    }

    /// Overwrites every measured field in place, keeping identity and key
    pub fn apply(&mut self, aggregate: DailyAggregate, fetched_at: DateTime<Utc>) {
        self.temperature = aggregate.temperature;
        self.min_temperature = aggregate.min_temperature;
        self.max_temperature = aggregate.max_temperature;
        self.feels_like_temperature = aggregate.feels_like_temperature;
        self.cloud_amount = aggregate.cloud_amount;
        self.sky = aggregate.sky;
        self.precipitation_probability = aggregate.precipitation_probability;
        self.humidity = aggregate.humidity;
        self.wind_speed = aggregate.wind_speed;
        self.fetched_at = fetched_at;
    }
}

/// Daily summary produced by the forecast aggregator, before reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub region: String,
    pub date: NaiveDate,
    pub temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub feels_like_temperature: f64,
    pub cloud_amount: i32,
    pub sky: String,
    pub precipitation_probability: i32,
    pub humidity: i32,
    pub wind_speed: f64,
}

/// Contiguous run of stored days for a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyWeather {
    pub region: String,
    pub days: Vec<DailyWeather>,
}

// ============================================================================
// OpenWeather 5 day / 3 hour forecast types
// ============================================================================

/// Raw response from the forecast endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    /// Application status; OpenWeather sends "200" as a string on success
    /// and sometimes a bare number on errors
    #[serde(default)]
    pub cod: serde_json::Value,
    #[serde(default)]
    pub message: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<ForecastSample>,
}

impl ForecastResponse {
    pub fn status_code(&self) -> String {
        match &self.cod {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }
}

/// One short-interval observation; consumed by the aggregator, never stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    /// Unix seconds
    pub dt: i64,
    #[serde(default)]
    pub main: Option<ForecastMain>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weather: Vec<ForecastCondition>,
    #[serde(default)]
    pub wind: Option<ForecastWind>,
    #[serde(default)]
    pub clouds: Option<ForecastClouds>,
    /// Probability of precipitation as a 0..=1 fraction
    #[serde(default)]
    pub pop: f64,
    #[serde(default)]
    pub dt_txt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastMain {
    pub temp: f64,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub humidity: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastCondition {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastWind {
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastClouds {
    #[serde(default)]
    pub all: i32,
}
