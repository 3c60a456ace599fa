use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::BTreeMap;

use crate::models::{DailyAggregate, ForecastSample};

/// Sky label used when no sample in a day carries one
pub const UNKNOWN_SKY: &str = "UNKNOWN";

/// Collapses short-interval forecast samples into one summary per calendar day
///
/// Days are computed in `offset`, come out in ascending order and are capped
/// at `max_days`. Samples whose timestamp cannot be represented are skipped.
pub fn aggregate(
    region: &str,
    samples: &[ForecastSample],
    max_days: usize,
    offset: FixedOffset,
) -> Vec<DailyAggregate> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&ForecastSample>> = BTreeMap::new();

    for sample in samples {
        match local_date(sample.dt, offset) {
            Some(date) => by_date.entry(date).or_default().push(sample),
            None => tracing::warn!(dt = sample.dt, "Skipping forecast sample with invalid timestamp"),
        }
    }

    by_date
        .into_iter()
        .take(max_days)
        .map(|(date, day)| aggregate_day(region, date, &day))
        .collect()
}

fn local_date(unix_seconds: i64, offset: FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp(unix_seconds, 0).map(|utc| utc.with_timezone(&offset).date_naive())
}

fn aggregate_day(region: &str, date: NaiveDate, samples: &[&ForecastSample]) -> DailyAggregate {
    let mains: Vec<_> = samples.iter().filter_map(|s| s.main.as_ref()).collect();

    let temperature = mean(mains.iter().map(|m| m.temp)).unwrap_or(0.0);
    let min_temperature = mains
        .iter()
        .filter_map(|m| m.temp_min)
        .reduce(f64::min)
        .unwrap_or(temperature);
    let max_temperature = mains
        .iter()
        .filter_map(|m| m.temp_max)
        .reduce(f64::max)
        .unwrap_or(temperature);
    let feels_like_temperature =
        mean(mains.iter().filter_map(|m| m.feels_like)).unwrap_or(temperature);

    let humidity = mean(mains.iter().filter_map(|m| m.humidity).map(f64::from))
        .map(percent)
        .unwrap_or(0);
    let cloud_amount = mean(
        samples
            .iter()
            .filter_map(|s| s.clouds.as_ref())
            .map(|c| f64::from(c.all)),
    )
    .map(percent)
    .unwrap_or(0);
    let wind_speed = mean(samples.iter().filter_map(|s| s.wind.as_ref()).map(|w| w.speed))
        .unwrap_or(0.0);

    let max_pop = samples.iter().map(|s| s.pop).reduce(f64::max).unwrap_or(0.0);
    let precipitation_probability = percent(max_pop * 100.0);

    DailyAggregate {
        region: region.to_string(),
        date,
        temperature,
        min_temperature,
        max_temperature,
        feels_like_temperature,
        cloud_amount,
        sky: dominant_sky(samples),
        precipitation_probability,
        humidity,
        wind_speed,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Most frequent condition label; ties go to the label seen first
fn dominant_sky(samples: &[&ForecastSample]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();

    let labels = samples
        .iter()
        .flat_map(|s| s.weather.iter())
        .filter_map(|w| w.main.as_deref());

    for label in labels {
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((label, count));
        }
    }

    best.map(|(label, _)| label.to_string())
        .unwrap_or_else(|| UNKNOWN_SKY.to_string())
}

/// Rounds to a whole percentage within 0..=100; NaN becomes 0
fn percent(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as i32
}
