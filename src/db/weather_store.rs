use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::{error::AppResult, models::DailyWeather};

/// Backing store for daily weather, keyed by `(region, date)`
#[async_trait]
pub trait WeatherStore: Send + Sync {
    async fn find_by_region_and_date(
        &self,
        region: &str,
        date: NaiveDate,
    ) -> AppResult<Option<DailyWeather>>;

    /// Records for `region` with `start <= date <= end`, ascending by date
    async fn find_range(
        &self,
        region: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DailyWeather>>;

    async fn count_range(&self, region: &str, start: NaiveDate, end: NaiveDate)
        -> AppResult<i64>;

    /// Most recent record on file for `region`, whatever its date
    async fn find_latest(&self, region: &str) -> AppResult<Option<DailyWeather>>;

    /// Upserts the whole batch by natural key as one atomic write
    async fn save_all(&self, records: Vec<DailyWeather>) -> AppResult<Vec<DailyWeather>>;
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, region, weather_date, temperature, min_temperature, max_temperature,
           feels_like_temperature, cloud_amount, sky, precipitation_probability,
           humidity, wind_speed, fetched_at
    FROM daily_weather
"#;

/// One statement for the batch: the arrays are zipped by UNNEST and every
/// row either inserts or overwrites the row already holding its key.
const UPSERT_BATCH: &str = r#"
    INSERT INTO daily_weather (
        region, weather_date, temperature, min_temperature, max_temperature,
        feels_like_temperature, cloud_amount, sky, precipitation_probability,
        humidity, wind_speed, fetched_at
    )
    SELECT * FROM UNNEST(
        $1::text[], $2::date[], $3::float8[], $4::float8[], $5::float8[],
        $6::float8[], $7::int4[], $8::text[], $9::int4[],
        $10::int4[], $11::float8[], $12::timestamptz[]
    )
    ON CONFLICT (region, weather_date) DO UPDATE SET
        temperature = EXCLUDED.temperature,
        min_temperature = EXCLUDED.min_temperature,
        max_temperature = EXCLUDED.max_temperature,
        feels_like_temperature = EXCLUDED.feels_like_temperature,
        cloud_amount = EXCLUDED.cloud_amount,
        sky = EXCLUDED.sky,
        precipitation_probability = EXCLUDED.precipitation_probability,
        humidity = EXCLUDED.humidity,
        wind_speed = EXCLUDED.wind_speed,
        fetched_at = EXCLUDED.fetched_at
    RETURNING id, region, weather_date, temperature, min_temperature, max_temperature,
              feels_like_temperature, cloud_amount, sky, precipitation_probability,
              humidity, wind_speed, fetched_at
"#;

/// PostgreSQL-backed weather store
#[derive(Clone)]
pub struct PgWeatherStore {
    pool: PgPool,
}

impl PgWeatherStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeatherStore for PgWeatherStore {
    async fn find_by_region_and_date(
        &self,
        region: &str,
        date: NaiveDate,
    ) -> AppResult<Option<DailyWeather>> {
        let sql = format!("{} WHERE region = $1 AND weather_date = $2", SELECT_COLUMNS);
        let record = sqlx::query_as::<_, DailyWeather>(&sql)
            .bind(region)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_range(
        &self,
        region: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<DailyWeather>> {
        let sql = format!(
            "{} WHERE region = $1 AND weather_date BETWEEN $2 AND $3 ORDER BY weather_date ASC",
            SELECT_COLUMNS
        );
        let records = sqlx::query_as::<_, DailyWeather>(&sql)
            .bind(region)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn count_range(
        &self,
        region: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM daily_weather WHERE region = $1 AND weather_date BETWEEN $2 AND $3",
        )
        .bind(region)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_latest(&self, region: &str) -> AppResult<Option<DailyWeather>> {
        let sql = format!(
            "{} WHERE region = $1 ORDER BY weather_date DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let record = sqlx::query_as::<_, DailyWeather>(&sql)
            .bind(region)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn save_all(&self, records: Vec<DailyWeather>) -> AppResult<Vec<DailyWeather>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut regions = Vec::with_capacity(records.len());
        let mut dates = Vec::with_capacity(records.len());
        let mut temperatures = Vec::with_capacity(records.len());
        let mut min_temperatures = Vec::with_capacity(records.len());
        let mut max_temperatures = Vec::with_capacity(records.len());
        let mut feels_like = Vec::with_capacity(records.len());
        let mut cloud_amounts = Vec::with_capacity(records.len());
        let mut skies = Vec::with_capacity(records.len());
        let mut precipitation = Vec::with_capacity(records.len());
        let mut humidities = Vec::with_capacity(records.len());
        let mut wind_speeds = Vec::with_capacity(records.len());
        let mut fetched_at: Vec<DateTime<Utc>> = Vec::with_capacity(records.len());

        for record in records {
            regions.push(record.region);
            dates.push(record.date);
            temperatures.push(record.temperature);
            min_temperatures.push(record.min_temperature);
            max_temperatures.push(record.max_temperature);
            feels_like.push(record.feels_like_temperature);
            cloud_amounts.push(record.cloud_amount);
            skies.push(record.sky);
            precipitation.push(record.precipitation_probability);
            humidities.push(record.humidity);
            wind_speeds.push(record.wind_speed);
            fetched_at.push(record.fetched_at);
        }

        let mut saved = sqlx::query_as::<_, DailyWeather>(UPSERT_BATCH)
            .bind(regions)
            .bind(dates)
            .bind(temperatures)
            .bind(min_temperatures)
            .bind(max_temperatures)
            .bind(feels_like)
            .bind(cloud_amounts)
            .bind(skies)
            .bind(precipitation)
            .bind(humidities)
            .bind(wind_speeds)
            .bind(fetched_at)
            .fetch_all(&self.pool)
            .await?;

        // RETURNING order is unspecified
        saved.sort_by_key(|r| r.date);

        tracing::debug!(rows = saved.len(), "Upserted daily weather batch");

        Ok(saved)
    }
}
