use serde::Serialize;

use crate::{
    config::normalize_path,
    error::{AppError, AppResult},
    models::{ComfortContext, ComfortItem, ComfortRequest, ComfortResponse},
};

use super::UpstreamTransport;

pub const DEFAULT_COMFORT_PATH: &str = "/comfort/batch";

/// Outbound context after repair; every field is finite
#[derive(Debug, Clone, PartialEq, Serialize)]
struct ComfortContextWire {
    #[serde(rename = "Ta")]
    ta: f64,
    #[serde(rename = "RH")]
    rh: f64,
    #[serde(rename = "Va")]
    va: f64,
    cloud: f64,
}

/// Outbound item; `c_ratio + p_ratio == 100`
#[derive(Debug, Clone, PartialEq, Serialize)]
struct ComfortItemWire {
    item_id: i64,
    c_ratio: i32,
    p_ratio: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ComfortRequestWire {
    context: ComfortContextWire,
    items: Vec<ComfortItemWire>,
}

/// Comfort-scoring gateway
#[derive(Clone)]
pub struct ComfortClient {
    transport: UpstreamTransport,
    path: String,
}

impl ComfortClient {
    pub fn new(transport: UpstreamTransport, path: &str) -> Self {
        Self {
            transport,
            path: normalize_path(path, DEFAULT_COMFORT_PATH),
        }
    }

    /// Scores a batch of items in one call
    ///
    /// Validation failures are returned before any network traffic.
    pub async fn call_batch(&self, request: &ComfortRequest) -> AppResult<ComfortResponse> {
        let (context, items) = validate(request)?;
        let wire = sanitize(context, items);

        tracing::debug!(items = wire.items.len(), path = %self.path, "Calling comfort batch");

        let response: ComfortResponse = self.transport.post_json(&self.path, &wire).await?;
        Ok(response)
    }
}

fn validate(request: &ComfortRequest) -> AppResult<(&ComfortContext, Vec<(i64, &ComfortItem)>)> {
    let context = request
        .context
        .as_ref()
        .ok_or_else(|| AppError::Validation("context is required".to_string()))?;

    if request.items.is_empty() {
        return Err(AppError::Validation("items must not be empty".to_string()));
    }

    let mut items = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let item = item
            .as_ref()
            .ok_or_else(|| AppError::Validation("item must not be null".to_string()))?;
        let item_id = item
            .item_id
            .ok_or_else(|| AppError::Validation("item_id is required".to_string()))?;

        let (c_ratio, p_ratio) = match (item.c_ratio, item.p_ratio) {
            (Some(c), Some(p)) => (c, p),
            _ => {
                return Err(AppError::Validation(
                    "c_ratio and p_ratio are required".to_string(),
                ))
            }
        };
        if !(0..=100).contains(&c_ratio) || !(0..=100).contains(&p_ratio) {
            return Err(AppError::Validation(
                "c_ratio and p_ratio must be between 0 and 100".to_string(),
            ));
        }

        items.push((item_id, item));
    }

    Ok((context, items))
}

fn sanitize(context: &ComfortContext, items: Vec<(i64, &ComfortItem)>) -> ComfortRequestWire {
    ComfortRequestWire {
        context: ComfortContextWire {
            ta: finite_or_zero(context.ta),
            rh: finite_or_zero(context.rh),
            va: finite_or_zero(context.va),
            cloud: finite_or_zero(context.cloud),
        },
        items: items
            .into_iter()
            .map(|(item_id, item)| {
                let (c_ratio, p_ratio) = normalize_ratio_pair(item.c_ratio, item.p_ratio);
                ComfortItemWire {
                    item_id,
                    c_ratio,
                    p_ratio,
                }
            })
            .collect(),
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Repairs a composition pair so both parts lie in 0..=100 and sum to 100
///
/// Missing parts count as 0. A pair summing to 0 becomes (50, 50); any other
/// sum is rescaled proportionally, rounding the first part.
pub fn normalize_ratio_pair(c_ratio: Option<i32>, p_ratio: Option<i32>) -> (i32, i32) {
    let c = c_ratio.unwrap_or(0).clamp(0, 100);
    let p = p_ratio.unwrap_or(0).clamp(0, 100);
    let sum = c + p;

    if sum == 100 {
        return (c, p);
    }
    if sum <= 0 {
        return (50, 50);
    }

    let scaled = ((f64::from(c) * 100.0) / f64::from(sum)).round() as i32;
    let scaled = scaled.clamp(0, 100);
    (scaled, 100 - scaled)
}
