//! Average and quantile computation over metric samples.
//!
//! Quantiles use the inclusive nearest-rank method (an actual data point is
//! selected, no interpolation) so that small samples stay interpretable.
//! Empty inputs yield `None` everywhere: "no data" and zero must never be
//! conflated in rollups.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

pub(crate) fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Round to millisecond-equivalent precision (3 decimal places).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn round4(value: f64) -> f64 {
    (value * 10000.0).round() / 10000.0
}

/// Arithmetic mean rounded to 3 decimals, or `None` for an empty input.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(round3(mean))
}

/// The q-th quantile via inclusive nearest-rank: sort ascending and select
/// index `round((n-1) * q)` clamped to `[0, n-1]`, rounded to 3 decimals.
/// Rank ties (a fractional part of exactly one half) round to the even
/// index, so the median of an even-length sample is a stable choice rather
/// than always the upper of the two middle ranks. `None` for an empty
/// input. For n=1 any q returns the single value; q=0 returns the minimum
/// and q=1 the maximum.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| cmp_f64(*a, *b));

    #[allow(clippy::cast_precision_loss)]
    let max_idx = (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let idx = round_half_even(max_idx * q).clamp(0.0, max_idx) as usize;

    Some(round3(sorted[idx]))
}

/// Round to the nearest integer with ties going to the even one.
fn round_half_even(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor == 0.5 {
        if floor.rem_euclid(2.0) == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        value.round()
    }
}

/// Fraction of successes rounded to 4 decimals, or `None` when nothing ran.
pub fn success_rate(successes: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = successes as f64 / total as f64;
    Some(round4(rate))
}

pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    round3(seconds)
}

pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let hours = (end - start).num_milliseconds() as f64 / 3_600_000.0;
    round3(hours)
}
