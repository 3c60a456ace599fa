use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    db::{Cache, CacheKey, WeatherStore},
    db::redis::WEEKLY_WINDOW_TTL,
    error::{AppError, AppResult},
    models::{Coordinates, DailyAggregate, DailyWeather, WeeklyWeather},
    services::{forecast_aggregator, providers::ForecastProvider},
};

/// Days the store should cover, starting today. Also caps aggregation so a
/// refresh never produces more days than the freshness check counts.
pub const WINDOW_DAYS: u32 = 5;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Keeps the store's weather window for a region fresh
///
/// Concurrent misses for the same region may each call the provider. The
/// upsert is keyed by `(region, date)`, so the last writer wins and no row is
/// ever duplicated.
///
/// Every upsert bumps a generation shared by all clones. A window is cached
/// only if no upsert happened since it was read, so a slow refresh cannot
/// re-cache days that a forced fetch just replaced. The guard covers one
/// process; other instances rely on the cache TTL.
#[derive(Clone)]
pub struct WeatherService {
    store: Arc<dyn WeatherStore>,
    provider: Arc<dyn ForecastProvider>,
    cache: Option<Cache>,
    generation: Arc<Mutex<u64>>,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl WeatherService {
    pub fn new(
        store: Arc<dyn WeatherStore>,
        provider: Arc<dyn ForecastProvider>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            provider,
            cache: None,
            generation: Arc::new(Mutex::new(0)),
            offset,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Calendar day in the reference offset
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    fn window(&self) -> (NaiveDate, NaiveDate) {
        let start = self.today();
        (start, start + Duration::days(i64::from(WINDOW_DAYS) - 1))
    }

    /// Today's record for `region`, refreshing the window when it is missing
    ///
    /// When today cannot be produced the most recent record on file is
    /// returned instead. Fails only when the region has no history at all.
    pub async fn get_today_smart(
        &self,
        coordinates: Coordinates,
        region: &str,
    ) -> AppResult<DailyWeather> {
        let today = self.today();

        if let Some(record) = self.store.find_by_region_and_date(region, today).await? {
            return Ok(record);
        }

        tracing::info!(region, %today, "No weather for today, refreshing window");

        if let Err(refresh_error) = self.refresh_if_needed(coordinates, region).await {
            return match self.store.find_latest(region).await? {
                Some(latest) => {
                    tracing::warn!(
                        region,
                        error = %refresh_error,
                        latest = %latest.date,
                        "Refresh failed, serving latest weather on file"
                    );
                    Ok(latest)
                }
                None => Err(refresh_error),
            };
        }

        if let Some(record) = self.store.find_by_region_and_date(region, today).await? {
            return Ok(record);
        }

        tracing::warn!(region, %today, "Still no weather for today after refresh, serving latest");
        self.store.find_latest(region).await?.ok_or_else(|| {
            AppError::NotFound(format!("No weather data for region {}", region))
        })
    }

    /// Stored records for `[today, today + WINDOW_DAYS - 1]`, read only
    pub async fn get_weekly_from_store(&self, region: &str) -> AppResult<WeeklyWeather> {
        let (start, end) = self.window();
        let days = self.store.find_range(region, start, end).await?;

        if days.is_empty() {
            return Err(AppError::NotFound(format!(
                "No weekly weather for region {} ({} ~ {})",
                region, start, end
            )));
        }

        Ok(WeeklyWeather {
            region: region.to_string(),
            days,
        })
    }

    /// Returns the window, calling the provider only when the store holds
    /// fewer than `WINDOW_DAYS` records for it
    pub async fn refresh_if_needed(
        &self,
        coordinates: Coordinates,
        region: &str,
    ) -> AppResult<WeeklyWeather> {
        let (start, end) = self.window();
        let key = CacheKey::WeeklyWindow {
            region: region.to_string(),
            start,
        };

        if let Some(window) = self.cached_window(&key).await {
            tracing::debug!(region, "Weekly window served from cache");
            return Ok(window);
        }

        let observed = self.generation().await;
        let count = self.store.count_range(region, start, end).await?;
        let (window, observed) = if count >= i64::from(WINDOW_DAYS) {
            tracing::info!(region, %start, %end, count, "Weekly window already complete");
            (self.get_weekly_from_store(region).await?, observed)
        } else {
            tracing::info!(region, %start, %end, count, "Weekly window incomplete, fetching forecast");
            self.fetch_and_store(coordinates, region).await?
        };

        self.cache_window(&key, &window, observed).await;

        Ok(window)
    }

    /// Unconditionally fetches, aggregates and upserts, then returns the window
    ///
    /// The only operation that overwrites days already on file.
    pub async fn forced_fetch(
        &self,
        coordinates: Coordinates,
        region: &str,
    ) -> AppResult<WeeklyWeather> {
        let (window, _) = self.fetch_and_store(coordinates, region).await?;
        Ok(window)
    }

    /// Current upsert generation
    pub async fn generation(&self) -> u64 {
        *self.generation.lock().await
    }

    /// Returns the stored window and the generation it was read under
    async fn fetch_and_store(
        &self,
        coordinates: Coordinates,
        region: &str,
    ) -> AppResult<(WeeklyWeather, u64)> {
        let samples = self.provider.fetch_forecast(coordinates).await?;

        let aggregates =
            forecast_aggregator::aggregate(region, &samples, WINDOW_DAYS as usize, self.offset);
        if aggregates.is_empty() {
            return Err(AppError::Internal(format!(
                "Forecast from {} produced no daily weather",
                self.provider.name()
            )));
        }

        let saved = self.upsert(region, aggregates).await?;
        tracing::info!(region, days = saved, provider = self.provider.name(), "Weather window reconciled");

        let generation = self.invalidate_window(region).await;

        let window = self.get_weekly_from_store(region).await?;
        Ok((window, generation))
    }

    async fn upsert(&self, region: &str, aggregates: Vec<DailyAggregate>) -> AppResult<usize> {
        let (Some(min), Some(max)) = (
            aggregates.iter().map(|a| a.date).min(),
            aggregates.iter().map(|a| a.date).max(),
        ) else {
            return Ok(0);
        };

        let existing = self.store.find_range(region, min, max).await?;
        let batch = reconcile(existing, aggregates, self.clock.now());
        let saved = self.store.save_all(batch).await?;

        Ok(saved.len())
    }

    async fn cached_window(&self, key: &CacheKey) -> Option<WeeklyWeather> {
        let cache = self.cache.as_ref()?;
        match cache.get_from_cache(key).await {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Weather cache read failed, treating as miss");
                None
            }
        }
    }

    /// Bumps the generation and drops the cached window under one lock
    async fn invalidate_window(&self, region: &str) -> u64 {
        let mut generation = self.generation.lock().await;
        *generation += 1;

        if let Some(cache) = &self.cache {
            let key = CacheKey::WeeklyWindow {
                region: region.to_string(),
                start: self.today(),
            };
            if let Err(e) = cache.invalidate(&key).await {
                tracing::warn!(key = %key, error = %e, "Weather cache invalidation failed");
            }
        }

        *generation
    }

    /// Queues the window for caching unless an upsert happened after `observed`
    async fn cache_window(&self, key: &CacheKey, window: &WeeklyWeather, observed: u64) {
        let Some(cache) = &self.cache else {
            return;
        };
        let generation = self.generation.lock().await;
        if *generation != observed {
            tracing::debug!(key = %key, "Window replaced while refreshing, not caching");
            return;
        }
        cache.set_in_background(key, window, WEEKLY_WINDOW_TTL);
    }
}

/// Merges freshly aggregated days into the records already on file
///
/// A day that exists keeps its identity and has every measured field
/// overwritten; a new day becomes a new record. `now` stamps both.
pub fn reconcile(
    existing: Vec<DailyWeather>,
    incoming: Vec<DailyAggregate>,
    now: DateTime<Utc>,
) -> Vec<DailyWeather> {
    let mut by_date: HashMap<NaiveDate, DailyWeather> =
        existing.into_iter().map(|r| (r.date, r)).collect();

    incoming
        .into_iter()
        .map(|aggregate| match by_date.remove(&aggregate.date) {
            Some(mut record) => {
                record.apply(aggregate, now);
                record
            }
            None => DailyWeather::from_aggregate(aggregate, now),
        })
        .collect()
}
