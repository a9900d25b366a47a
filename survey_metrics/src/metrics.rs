use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use log::debug;

use crate::config::Granularity;

/// Net Promoter Score of a set of 0-10 recommendation scores.
///
/// Missing scores are dropped first. Returns `None` when nothing is left, so an
/// empty group never reads as an NPS of 0.
///
/// ```
/// use survey_metrics::compute_nps;
///
/// assert_eq!(compute_nps(&[Some(9), Some(6)]), Some(0.0));
/// assert_eq!(compute_nps(&[None, None]), None);
/// ```
pub fn compute_nps(scores: &[Option<u8>]) -> Option<f64> {
    let valid: Vec<u8> = scores.iter().flatten().copied().collect();
    if valid.is_empty() {
        return None;
    }
    let n = valid.len() as f64;
    let promoters = valid.iter().filter(|&&s| s >= 9).count() as f64;
    let detractors = valid.iter().filter(|&&s| s <= 6).count() as f64;
    let nps = 100.0 * (promoters / n) - 100.0 * (detractors / n);
    debug!(
        "compute_nps: n: {} promoters: {} detractors: {} nps: {}",
        n, promoters, detractors, nps
    );
    Some(nps)
}

/// Mean of the values that are present. `None` if all of them are missing.
pub fn mean_numeric(values: &[Option<u8>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0u64, 0usize), |(s, c), &v| (s + v as u64, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

/// Start of the day, ISO week (Monday) or month containing `ts`.
pub fn period_floor(ts: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    let date = ts.date();
    let start = match granularity {
        Granularity::Day => date,
        Granularity::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        // Day 1 exists in every month.
        Granularity::Month => date.with_day(1).unwrap_or(date),
    };
    start.and_time(NaiveTime::MIN)
}
