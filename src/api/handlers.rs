use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{
        ClothingCategory, ComfortRequest, ComfortResponse, DailyWeather, RecommendationRequest,
        RecommendationResult, WeeklyWeather,
    },
};

use super::AppState;

// Query types

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegionQuery {
    pub region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub force: bool,
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TodayRecommendationQuery {
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Today's weather, refreshing the window on demand
pub async fn weather_today(
    State(state): State<AppState>,
    Query(params): Query<LocationQuery>,
) -> AppResult<Json<DailyWeather>> {
    let (region, coordinates) =
        state.resolve_location(params.region.as_deref(), params.lat, params.lon);

    let weather = state.weather.get_today_smart(coordinates, &region).await?;
    Ok(Json(weather))
}

/// Stored window only; never calls the provider
pub async fn weather_weekly(
    State(state): State<AppState>,
    Query(params): Query<RegionQuery>,
) -> AppResult<Json<WeeklyWeather>> {
    let (region, _) = state.resolve_location(params.region.as_deref(), None, None);

    let weekly = state.weather.get_weekly_from_store(&region).await?;
    Ok(Json(weekly))
}

pub async fn refresh_weekly(
    State(state): State<AppState>,
    Query(params): Query<RefreshQuery>,
) -> AppResult<Json<WeeklyWeather>> {
    let (region, coordinates) =
        state.resolve_location(params.region.as_deref(), params.lat, params.lon);

    tracing::info!(region = %region, force = params.force, "Weekly weather refresh requested");

    let weekly = if params.force {
        state.weather.forced_fetch(coordinates, &region).await?
    } else {
        state.weather.refresh_if_needed(coordinates, &region).await?
    };
    Ok(Json(weekly))
}

/// Ranks caller-supplied items; always answers 200
///
/// A missing or unreadable body is treated as an absent request.
pub async fn recommend_materials(
    State(state): State<AppState>,
    request: Option<Json<RecommendationRequest>>,
) -> Json<RecommendationResult> {
    let result = state.pipeline.recommend(request.map(|Json(r)| r)).await;
    Json(result)
}

pub async fn recommend_today(
    State(state): State<AppState>,
    Query(params): Query<TodayRecommendationQuery>,
) -> AppResult<Json<RecommendationResult>> {
    let category = params
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(str::parse::<ClothingCategory>)
        .transpose()
        .map_err(AppError::Validation)?;

    let (region, coordinates) =
        state.resolve_location(params.region.as_deref(), params.lat, params.lon);

    let result = state
        .recommendations
        .recommend_today(coordinates, &region, category, params.limit)
        .await?;
    Ok(Json(result))
}

/// Direct pass-through to the comfort gateway
///
/// An unreadable body is a validation failure like any other.
pub async fn comfort_batch(
    State(state): State<AppState>,
    body: Result<Json<ComfortRequest>, JsonRejection>,
) -> AppResult<Json<ComfortResponse>> {
    let Json(request) = body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let response = state.comfort.call_batch(&request).await?;
    Ok(Json(response))
}
