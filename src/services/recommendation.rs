use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    db::{AuditSink, ClothingCatalog},
    error::{AppError, AppResult},
    models::{
        AuditEvent, AuditEventType, ClothingCategory, Coordinates, DailyWeather, FallbackReason,
        RankedItem, Recommendation, RecommendationItem, RecommendationRequest,
        RecommendationResult, WeatherSnapshot,
    },
    services::{upstream::RecommendationGateway, weather::WeatherService},
};

/// Number of items a recommendation returns at most
pub const TOP_K: usize = 3;

pub const DEFAULT_CANDIDATE_LIMIT: i64 = 50;
pub const MAX_CANDIDATE_LIMIT: i64 = 200;

/// Ranks candidate items through the AI gateway, degrading to a
/// deterministic pick when the gateway fails or returns nothing usable
#[derive(Clone)]
pub struct RecommendationPipeline {
    gateway: Arc<dyn RecommendationGateway>,
    audit: Arc<dyn AuditSink>,
}

impl RecommendationPipeline {
    pub fn new(gateway: Arc<dyn RecommendationGateway>, audit: Arc<dyn AuditSink>) -> Self {
        Self { gateway, audit }
    }

    /// Always produces a result; failures become `fallback` results
    pub async fn recommend(&self, request: Option<RecommendationRequest>) -> RecommendationResult {
        let started = Instant::now();

        let Some(request) = request else {
            return RecommendationResult::fallback(FallbackReason::ReqNull, Vec::new());
        };
        if request.weather.is_none() {
            return RecommendationResult::fallback(FallbackReason::WeatherNull, Vec::new());
        }
        if request.items.is_empty() {
            return RecommendationResult::fallback(FallbackReason::ItemsEmpty, Vec::new());
        }

        match self.gateway.recommend(&request).await {
            Ok(response) => {
                let message = response.message;
                let upstream = response.recommendations.unwrap_or_default();
                let upstream_count = upstream.len();
                let picked = rank(upstream);

                self.record(
                    AuditEvent::new(AuditEventType::RecoGenerated)
                        .with("type", "MATERIAL_AI_RECOMMEND")
                        .with("latency_ms", elapsed_ms(started))
                        .with("req_item_count", request.items.len())
                        .with("ai_rec_count", upstream_count)
                        .with("picked_count", picked.len()),
                )
                .await;

                if picked.is_empty() {
                    tracing::warn!(upstream_count, "No usable recommendations after filtering");
                    return fallback_top_k(&request.items, FallbackReason::AiEmpty);
                }

                tracing::info!(
                    candidates = request.items.len(),
                    picked = picked.len(),
                    "Recommendation generated"
                );
                RecommendationResult::success(picked, message)
            }
            Err(e) => {
                tracing::warn!(error = %e, code = %e.code(), "Recommendation upstream failed, using fallback");

                self.record(
                    AuditEvent::new(AuditEventType::RecoError)
                        .with("type", "MATERIAL_AI_EXCEPTION")
                        .with("latency_ms", elapsed_ms(started))
                        .with("error_type", e.kind())
                        .with("error_code", e.code())
                        .with("message", e.to_string()),
                )
                .await;

                fallback_top_k(&request.items, FallbackReason::AiException)
            }
        }
    }

    async fn record(&self, event: AuditEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.audit.append(event).await {
            tracing::warn!(event_type = %event_type, error = %e, "Failed to write audit event");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Drops unusable entries, orders by score and keeps the top `TOP_K`
///
/// Entries without an id or with a non-finite score are discarded. Scores sort
/// descending and missing scores go last; the sort is stable so ties keep
/// their upstream order.
fn rank(recommendations: Vec<Option<Recommendation>>) -> Vec<RankedItem> {
    let mut ranked: Vec<RankedItem> = recommendations
        .into_iter()
        .flatten()
        .filter_map(|r| {
            let clothing_id = r.clothing_id?;
            if r.score.is_some_and(|s| !s.is_finite()) {
                return None;
            }
            Some(RankedItem {
                clothing_id,
                name: r.name,
                score: r.score,
                analysis: r.analysis,
            })
        })
        .collect();

    ranked.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ranked.truncate(TOP_K);
    ranked
}

/// First `TOP_K` non-null candidates with an id, in the order given
fn fallback_top_k(
    items: &[Option<RecommendationItem>],
    reason: FallbackReason,
) -> RecommendationResult {
    let picked = items
        .iter()
        .flatten()
        .filter_map(|item| {
            let clothing_id = item.clothing_id?;
            let name = match item.name.as_deref() {
                Some(name) if !name.trim().is_empty() => name.to_string(),
                _ => "unknown".to_string(),
            };
            Some(RankedItem {
                clothing_id,
                name: Some(name),
                score: None,
                analysis: Some(format!("fallback: {}", reason)),
            })
        })
        .take(TOP_K)
        .collect();

    RecommendationResult::fallback(reason, picked)
}

fn snapshot_of(weather: &DailyWeather) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature: Some(weather.temperature),
        feels_like_temperature: Some(weather.feels_like_temperature),
        humidity: Some(weather.humidity),
        precipitation_probability: Some(weather.precipitation_probability),
    }
}

/// Resolves a requested candidate-pool size
pub fn resolve_limit(limit: Option<i64>) -> AppResult<i64> {
    let limit = limit.unwrap_or(DEFAULT_CANDIDATE_LIMIT);
    if !(1..=MAX_CANDIDATE_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_CANDIDATE_LIMIT
        )));
    }
    Ok(limit)
}

/// Today's recommendation: current weather plus catalog candidates through
/// the pipeline
#[derive(Clone)]
pub struct RecommendationService {
    weather: WeatherService,
    catalog: Arc<dyn ClothingCatalog>,
    pipeline: RecommendationPipeline,
}

impl RecommendationService {
    pub fn new(
        weather: WeatherService,
        catalog: Arc<dyn ClothingCatalog>,
        pipeline: RecommendationPipeline,
    ) -> Self {
        Self {
            weather,
            catalog,
            pipeline,
        }
    }

    /// Weather failures propagate; the pipeline itself never fails
    pub async fn recommend_today(
        &self,
        coordinates: Coordinates,
        region: &str,
        category: Option<ClothingCategory>,
        limit: Option<i64>,
    ) -> AppResult<RecommendationResult> {
        let limit = resolve_limit(limit)?;

        let weather = self.weather.get_today_smart(coordinates, region).await?;
        let candidates = self.catalog.list_candidates(category, limit).await?;

        tracing::info!(
            region,
            category = ?category,
            candidates = candidates.len(),
            "Recommending for today"
        );

        let request = RecommendationRequest {
            items: candidates
                .into_iter()
                .map(|c| Some(RecommendationItem::from(c)))
                .collect(),
            weather: Some(snapshot_of(&weather)),
        };

        Ok(self.pipeline.recommend(Some(request)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        audit_log::MockAuditSink, InMemoryAuditSink, InMemoryClothingCatalog,
        InMemoryWeatherStore, WeatherStore,
    };
    use crate::error::UpstreamError;
    use crate::models::{ClothingCandidate, RecommendationResponse, RecommendationStatus};
    use crate::services::providers::MockForecastProvider;
    use crate::services::upstream::recommendation::MockRecommendationGateway;
    use crate::services::weather::FixedClock;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn items(n: i64) -> Vec<RecommendationItem> {
        (1..=n)
            .map(|id| RecommendationItem {
                clothing_id: Some(id),
                name: Some(format!("item-{}", id)),
                category: Some("TOP".to_string()),
            })
            .collect()
    }

    fn request(items: Vec<RecommendationItem>) -> RecommendationRequest {
        RecommendationRequest {
            items: items.into_iter().map(Some).collect(),
            weather: Some(WeatherSnapshot {
                temperature: Some(12.0),
                feels_like_temperature: Some(10.0),
                humidity: Some(55),
                precipitation_probability: Some(20),
            }),
        }
    }

    fn rec(id: Option<i64>, score: Option<f64>) -> Option<Recommendation> {
        Some(Recommendation {
            clothing_id: id,
            name: id.map(|i| format!("rec-{}", i)),
            score,
            analysis: None,
        })
    }

    fn success(recommendations: Vec<Option<Recommendation>>) -> RecommendationResponse {
        RecommendationResponse {
            status: Some("success".to_string()),
            recommendations: Some(recommendations),
            message: Some("ok".to_string()),
        }
    }

    fn gateway_returning(response: AppResult<RecommendationResponse>) -> MockRecommendationGateway {
        let mut gateway = MockRecommendationGateway::new();
        let response = std::sync::Mutex::new(Some(response));
        gateway.expect_recommend().times(1).returning(move |_| {
            response
                .lock()
                .unwrap()
                .take()
                .expect("gateway called more than once")
        });
        gateway
    }

    fn pipeline(
        gateway: MockRecommendationGateway,
        audit: &InMemoryAuditSink,
    ) -> RecommendationPipeline {
        RecommendationPipeline::new(Arc::new(gateway), Arc::new(audit.clone()))
    }

    fn ids(result: &RecommendationResult) -> Vec<i64> {
        result.recommendations.iter().map(|r| r.clothing_id).collect()
    }

    #[tokio::test]
    async fn test_guards_short_circuit_without_upstream_call() {
        let audit = InMemoryAuditSink::new();
        let mut gateway = MockRecommendationGateway::new();
        gateway.expect_recommend().times(0);
        let pipeline = pipeline(gateway, &audit);

        let result = pipeline.recommend(None).await;
        assert_eq!(result.reason, Some(FallbackReason::ReqNull));

        let mut no_weather = request(items(2));
        no_weather.weather = None;
        let result = pipeline.recommend(Some(no_weather)).await;
        assert_eq!(result.reason, Some(FallbackReason::WeatherNull));
        assert!(result.recommendations.is_empty());

        let result = pipeline.recommend(Some(request(vec![]))).await;
        assert_eq!(result.status, RecommendationStatus::Fallback);
        assert_eq!(result.reason, Some(FallbackReason::ItemsEmpty));
        assert_eq!(result.message.as_deref(), Some("items_empty"));
        assert!(result.recommendations.is_empty());

        assert!(audit.events().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_timeout_falls_back_to_candidate_order() {
        let audit = InMemoryAuditSink::new();
        let gateway = gateway_returning(Err(AppError::Upstream(UpstreamError::Timeout {
            message: "read timed out".to_string(),
        })));

        let result = pipeline(gateway, &audit)
            .recommend(Some(request(items(5))))
            .await;

        assert!(result.is_fallback());
        assert!(result.reason.unwrap().as_str().contains("exception"));
        assert_eq!(ids(&result), vec![1, 2, 3]);
        assert!(result.recommendations.iter().all(|r| r.score.is_none()));
        assert_eq!(
            result.recommendations[0].analysis.as_deref(),
            Some("fallback: ai_exception")
        );

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::RecoError);
        assert_eq!(events[0].payload["type"], "MATERIAL_AI_EXCEPTION");
        assert_eq!(events[0].payload["error_type"], "UpstreamTimeout");
        assert_eq!(events[0].payload["error_code"], "AI_TIMEOUT");
        assert!(events[0].payload.contains_key("latency_ms"));
    }

    #[tokio::test]
    async fn test_ranking_drops_nan_and_puts_missing_scores_last() {
        let audit = InMemoryAuditSink::new();
        let gateway = gateway_returning(Ok(success(vec![
            rec(Some(5), Some(5.0)),
            rec(Some(100), None),
            rec(Some(9), Some(9.0)),
            rec(Some(77), Some(f64::NAN)),
        ])));

        let result = pipeline(gateway, &audit)
            .recommend(Some(request(items(4))))
            .await;

        assert_eq!(result.status, RecommendationStatus::Success);
        assert_eq!(ids(&result), vec![9, 5, 100]);
        assert_eq!(result.recommendations[2].score, None);
        assert_eq!(result.message.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_ranking_prefers_any_score_over_missing_score() {
        let audit = InMemoryAuditSink::new();
        let gateway = gateway_returning(Ok(success(vec![
            rec(Some(5), Some(5.0)),
            rec(Some(100), None),
            rec(Some(9), Some(9.0)),
            rec(Some(77), Some(f64::NAN)),
            rec(Some(2), Some(2.0)),
        ])));

        let result = pipeline(gateway, &audit)
            .recommend(Some(request(items(5))))
            .await;

        assert_eq!(ids(&result), vec![9, 5, 2]);

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::RecoGenerated);
        assert_eq!(events[0].payload["type"], "MATERIAL_AI_RECOMMEND");
        assert_eq!(events[0].payload["req_item_count"], 5);
        assert_eq!(events[0].payload["ai_rec_count"], 5);
        assert_eq!(events[0].payload["picked_count"], 3);
    }

    #[tokio::test]
    async fn test_ties_keep_upstream_order() {
        let audit = InMemoryAuditSink::new();
        let gateway = gateway_returning(Ok(success(vec![
            rec(Some(1), None),
            rec(Some(2), Some(0.5)),
            rec(Some(3), None),
            rec(Some(4), Some(0.5)),
            None,
            rec(None, Some(0.99)),
        ])));

        let result = pipeline(gateway, &audit)
            .recommend(Some(request(items(4))))
            .await;

        assert_eq!(ids(&result), vec![2, 4, 1]);
    }

    #[tokio::test]
    async fn test_nothing_usable_falls_back_as_empty() {
        let audit = InMemoryAuditSink::new();
        let gateway = gateway_returning(Ok(success(vec![
            rec(None, Some(1.0)),
            rec(Some(1), Some(f64::INFINITY)),
            None,
        ])));

        let mut candidates = items(2);
        candidates[0].name = Some("   ".to_string());
        let result = pipeline(gateway, &audit)
            .recommend(Some(request(candidates)))
            .await;

        assert_eq!(result.reason, Some(FallbackReason::AiEmpty));
        assert_eq!(ids(&result), vec![1, 2]);
        assert_eq!(result.recommendations[0].name.as_deref(), Some("unknown"));
        assert_eq!(
            result.recommendations[0].analysis.as_deref(),
            Some("fallback: ai_empty")
        );

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::RecoGenerated);
        assert_eq!(events[0].payload["picked_count"], 0);
    }

    #[tokio::test]
    async fn test_fallback_skips_candidates_without_id() {
        let audit = InMemoryAuditSink::new();
        let gateway = gateway_returning(Err(AppError::Upstream(UpstreamError::BadSchema {
            message: "AI recommendations is null".to_string(),
        })));

        let mut candidates = items(4);
        candidates[0].clothing_id = None;
        let result = pipeline(gateway, &audit)
            .recommend(Some(request(candidates)))
            .await;

        assert_eq!(ids(&result), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_null_candidate_is_skipped_by_fallback() {
        let audit = InMemoryAuditSink::new();
        let gateway = gateway_returning(Err(AppError::Validation(
            "item must not be null".to_string(),
        )));

        let mut with_null = request(items(2));
        with_null.items.insert(0, None);
        let result = pipeline(gateway, &audit).recommend(Some(with_null)).await;

        assert_eq!(result.reason, Some(FallbackReason::AiException));
        assert_eq!(ids(&result), vec![1, 2]);

        let events = audit.events();
        assert_eq!(events[0].payload["error_code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_audit_failure_is_swallowed() {
        let mut audit = MockAuditSink::new();
        audit
            .expect_append()
            .times(1)
            .returning(|_| Err(AppError::Internal("audit table missing".to_string())));
        let gateway = gateway_returning(Ok(success(vec![rec(Some(1), Some(0.7))])));

        let pipeline = RecommendationPipeline::new(Arc::new(gateway), Arc::new(audit));
        let result = pipeline.recommend(Some(request(items(1)))).await;

        assert_eq!(result.status, RecommendationStatus::Success);
        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_resolve_limit() {
        assert_eq!(tokio_test::assert_ok!(resolve_limit(None)), 50);
        assert_eq!(tokio_test::assert_ok!(resolve_limit(Some(1))), 1);
        assert_eq!(tokio_test::assert_ok!(resolve_limit(Some(200))), 200);

        let err = tokio_test::assert_err!(resolve_limit(Some(0)));
        assert!(matches!(err, AppError::Validation(_)));
        tokio_test::assert_err!(resolve_limit(Some(201)));
    }

    #[tokio::test]
    async fn test_recommend_today_builds_request_from_weather_and_catalog() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap();
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();

        let store = InMemoryWeatherStore::new();
        store
            .save_all(vec![DailyWeather {
                id: None,
                region: "Seoul".to_string(),
                date: now.with_timezone(&kst).date_naive(),
                temperature: 7.5,
                min_temperature: 3.0,
                max_temperature: 11.0,
                feels_like_temperature: 5.0,
                cloud_amount: 20,
                sky: "Clear".to_string(),
                precipitation_probability: 10,
                humidity: 45,
                wind_speed: 2.0,
                fetched_at: now,
            }])
            .await
            .unwrap();

        let mut provider = MockForecastProvider::new();
        provider.expect_fetch_forecast().times(0);
        let weather = WeatherService::new(Arc::new(store), Arc::new(provider), kst)
            .with_clock(Arc::new(FixedClock(now)));

        let catalog = InMemoryClothingCatalog::new(vec![
            ClothingCandidate {
                clothing_id: 10,
                name: "Trench coat".to_string(),
                category: ClothingCategory::Outer,
            },
            ClothingCandidate {
                clothing_id: 11,
                name: "Tee".to_string(),
                category: ClothingCategory::Top,
            },
        ]);

        let mut gateway = MockRecommendationGateway::new();
        gateway
            .expect_recommend()
            .withf(|req| {
                let weather = req.weather.as_ref().unwrap();
                weather.temperature == Some(7.5)
                    && weather.feels_like_temperature == Some(5.0)
                    && weather.humidity == Some(45)
                    && weather.precipitation_probability == Some(10)
                    && req.items.len() == 1
                    && req.items[0]
                        .as_ref()
                        .is_some_and(|i| i.category.as_deref() == Some("OUTER"))
            })
            .times(1)
            .returning(|_| Ok(success(vec![rec(Some(10), Some(0.9))])));

        let audit = InMemoryAuditSink::new();
        let service = RecommendationService::new(
            weather,
            Arc::new(catalog),
            RecommendationPipeline::new(Arc::new(gateway), Arc::new(audit)),
        );

        let result = service
            .recommend_today(
                Coordinates {
                    lat: 37.5665,
                    lon: 126.978,
                },
                "Seoul",
                Some(ClothingCategory::Outer),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.status, RecommendationStatus::Success);
        assert_eq!(ids(&result), vec![10]);
    }

    #[tokio::test]
    async fn test_recommend_today_rejects_limit_before_weather() {
        let mut provider = MockForecastProvider::new();
        provider.expect_fetch_forecast().times(0);
        let weather = WeatherService::new(
            Arc::new(InMemoryWeatherStore::new()),
            Arc::new(provider),
            FixedOffset::east_opt(9 * 3600).unwrap(),
        );
        let mut gateway = MockRecommendationGateway::new();
        gateway.expect_recommend().times(0);

        let service = RecommendationService::new(
            weather,
            Arc::new(InMemoryClothingCatalog::default()),
            RecommendationPipeline::new(Arc::new(gateway), Arc::new(InMemoryAuditSink::new())),
        );

        let err = service
            .recommend_today(
                Coordinates { lat: 0.0, lon: 0.0 },
                "Seoul",
                None,
                Some(500),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }
}
