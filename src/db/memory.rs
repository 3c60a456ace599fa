//! In-memory collaborators for tests and local wiring without PostgreSQL

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    models::{AuditEvent, ClothingCandidate, ClothingCategory, DailyWeather},
};

use super::{AuditSink, ClothingCatalog, WeatherStore};

type WeatherKey = (String, NaiveDate);

#[derive(Clone, Default)]
pub struct InMemoryWeatherStore {
    rows: Arc<RwLock<HashMap<WeatherKey, DailyWeather>>>,
    next_id: Arc<AtomicI64>,
    save_calls: Arc<AtomicUsize>,
}

impl InMemoryWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all regions
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Number of `save_all` batches written so far
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherStore for InMemoryWeatherStore {
    async fn find_by_region_and_date(
        &self,
        region: &str,
        date: NaiveDate,
    ) -> AppResult<Option<DailyWeather>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(region.to_string(), date)).cloned())
    }

    async fn find_range(
        &self,
        region: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DailyWeather>> {
        let rows = self.rows.read().await;
        let mut found: Vec<DailyWeather> = rows
            .values()
            .filter(|r| r.region == region && r.date >= start && r.date <= end)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.date);
        Ok(found)
    }

    async fn count_range(
        &self,
        region: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<i64> {
        let rows = self.rows.read().await;
        let count = rows
            .values()
            .filter(|r| r.region == region && r.date >= start && r.date <= end)
            .count();
        Ok(count as i64)
    }

    async fn find_latest(&self, region: &str) -> AppResult<Option<DailyWeather>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|r| r.region == region)
            .max_by_key(|r| r.date)
            .cloned())
    }

    async fn save_all(&self, records: Vec<DailyWeather>) -> AppResult<Vec<DailyWeather>> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        // Single write lock for the batch so readers never see half of it
        let mut rows = self.rows.write().await;
        let mut saved = Vec::with_capacity(records.len());

        for mut record in records {
            let key = (record.region.clone(), record.date);
            record.id = match rows.get(&key).and_then(|existing| existing.id) {
                Some(id) => Some(id),
                None => Some(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            };
            rows.insert(key, record.clone());
            saved.push(record);
        }

        saved.sort_by_key(|r| r.date);
        Ok(saved)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, event: AuditEvent) -> AppResult<()> {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

/// Fixed candidate list, returned in insertion order
#[derive(Clone, Default)]
pub struct InMemoryClothingCatalog {
    items: Vec<ClothingCandidate>,
}

impl InMemoryClothingCatalog {
    pub fn new(items: Vec<ClothingCandidate>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl ClothingCatalog for InMemoryClothingCatalog {
    async fn list_candidates(
        &self,
        category: Option<ClothingCategory>,
        limit: i64,
    ) -> AppResult<Vec<ClothingCandidate>> {
        Ok(self
            .items
            .iter()
            .filter(|item| category.map_or(true, |c| item.category == c))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditEventType;
    use chrono::Utc;

    fn day(region: &str, date: NaiveDate, temperature: f64) -> DailyWeather {
        DailyWeather {
            id: None,
            region: region.to_string(),
            date,
            temperature,
            min_temperature: temperature,
            max_temperature: temperature,
            feels_like_temperature: temperature,
            cloud_amount: 0,
            sky: "Clear".to_string(),
            precipitation_probability: 0,
            humidity: 50,
            wind_speed: 1.0,
            fetched_at: Utc::now(),
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_save_all_upserts_by_natural_key() {
        let store = InMemoryWeatherStore::new();

        let first = store.save_all(vec![day("Seoul", date(1), 10.0)]).await.unwrap();
        let id = first[0].id;
        assert!(id.is_some());

        store
            .save_all(vec![day("Seoul", date(1), 12.0), day("Seoul", date(2), 14.0)])
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        let updated = store
            .find_by_region_and_date("Seoul", date(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, id);
        assert_eq!(updated.temperature, 12.0);
        assert_eq!(store.save_calls(), 2);
    }

    #[tokio::test]
    async fn test_range_queries_are_scoped_by_region() {
        let store = InMemoryWeatherStore::new();
        store
            .save_all(vec![
                day("Seoul", date(3), 1.0),
                day("Seoul", date(1), 1.0),
                day("Busan", date(2), 1.0),
                day("Seoul", date(9), 1.0),
            ])
            .await
            .unwrap();

        let range = store.find_range("Seoul", date(1), date(5)).await.unwrap();
        let dates: Vec<NaiveDate> = range.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(1), date(3)]);
        assert_eq!(store.count_range("Seoul", date(1), date(5)).await.unwrap(), 2);

        let latest = store.find_latest("Seoul").await.unwrap().unwrap();
        assert_eq!(latest.date, date(9));
        assert!(store.find_latest("Daegu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audit_sink_records_events() {
        let sink = InMemoryAuditSink::new();
        sink.append(AuditEvent::new(AuditEventType::RecoGenerated))
            .await
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::RecoGenerated);
    }

    #[tokio::test]
    async fn test_catalog_filters_and_limits() {
        let catalog = InMemoryClothingCatalog::new(vec![
            ClothingCandidate {
                clothing_id: 1,
                name: "Tee".to_string(),
                category: ClothingCategory::Top,
            },
            ClothingCandidate {
                clothing_id: 2,
                name: "Jeans".to_string(),
                category: ClothingCategory::Bottom,
            },
            ClothingCandidate {
                clothing_id: 3,
                name: "Hoodie".to_string(),
                category: ClothingCategory::Top,
            },
        ]);

        let tops = catalog
            .list_candidates(Some(ClothingCategory::Top), 10)
            .await
            .unwrap();
        assert_eq!(tops.len(), 2);

        let limited = catalog.list_candidates(None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].clothing_id, 1);
    }
}
