use async_trait::async_trait;

use crate::{
    config::normalize_path,
    error::{AppError, AppResult, UpstreamError},
    models::{RecommendationRequest, RecommendationResponse},
};

use super::UpstreamTransport;

pub const DEFAULT_RECOMMEND_PATH: &str = "/recommend";

/// Item-recommendation scoring, as seen by the pipeline
///
/// A returned response always has a `success` status and a present
/// `recommendations` collection; anything else is an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecommendationGateway: Send + Sync {
    async fn recommend(&self, request: &RecommendationRequest) -> AppResult<RecommendationResponse>;
}

#[derive(Clone)]
pub struct RecommendationClient {
    transport: UpstreamTransport,
    path: String,
}

impl RecommendationClient {
    pub fn new(transport: UpstreamTransport, path: &str) -> Self {
        Self {
            transport,
            path: normalize_path(path, DEFAULT_RECOMMEND_PATH),
        }
    }
}

#[async_trait]
impl RecommendationGateway for RecommendationClient {
    async fn recommend(&self, request: &RecommendationRequest) -> AppResult<RecommendationResponse> {
        validate(request)?;

        let response: RecommendationResponse = self.transport.post_json(&self.path, request).await?;
        Ok(check_response(response)?)
    }
}

fn validate(request: &RecommendationRequest) -> AppResult<()> {
    if request.weather.is_none() {
        return Err(AppError::Validation("weather is required".to_string()));
    }
    if request.items.is_empty() {
        return Err(AppError::Validation("items must not be empty".to_string()));
    }

    for item in &request.items {
        let item = item
            .as_ref()
            .ok_or_else(|| AppError::Validation("item must not be null".to_string()))?;
        if item.clothing_id.is_none() {
            return Err(AppError::Validation("clothingId is required".to_string()));
        }
        if is_blank(item.name.as_deref()) {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if is_blank(item.category.as_deref()) {
            return Err(AppError::Validation("category is required".to_string()));
        }
    }

    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Application-level checks on a decoded 2xx body
fn check_response(response: RecommendationResponse) -> Result<RecommendationResponse, UpstreamError> {
    let status = response
        .status
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    if status != "success" {
        return Err(UpstreamError::ApplicationFailure {
            status: response.status.clone().unwrap_or_else(|| "null".to_string()),
            message: response.message.clone().unwrap_or_else(|| "null".to_string()),
        });
    }

    if response.recommendations.is_none() {
        return Err(UpstreamError::BadSchema {
            message: "AI recommendations is null".to_string(),
        });
    }

    Ok(response)
}
