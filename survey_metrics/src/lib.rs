mod config;
mod metrics;
pub mod store;
pub mod submission;
pub mod manual;

use log::{debug, info};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate, NaiveDateTime};

pub use crate::config::*;
pub use crate::metrics::{compute_nps, mean_numeric, period_floor};
pub use crate::store::{MemoryStore, ResponseStore, StoreError};
pub use crate::submission::{record_submission, validate_draft, SubmissionDraft, SubmissionError};

/// One condition of the dashboard selection.
///
/// Every predicate looks at a single row, so applying a list of them in any
/// order selects the same rows.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Predicate {
    /// Local calendar date within `[start, end]`, both ends included.
    DateBetween(NaiveDate, NaiveDate),
    UnitIs(String),
    UserTypeIs(String),
}

impl Predicate {
    pub fn matches(&self, response: &Response) -> bool {
        match self {
            Predicate::DateBetween(start, end) => {
                let d = response.local_date();
                *start <= d && d <= *end
            }
            Predicate::UnitIs(unit) => response.unit == *unit,
            Predicate::UserTypeIs(user_type) => response.user_type == *user_type,
        }
    }
}

impl FilterCriteria {
    /// Criteria selecting everything between the first and the last response.
    ///
    /// Returns `None` when there is no response.
    pub fn spanning(responses: &[Response]) -> Option<FilterCriteria> {
        let start_date = responses.iter().map(|r| r.local_date()).min()?;
        let end_date = responses.iter().map(|r| r.local_date()).max()?;
        Some(FilterCriteria {
            start_date,
            end_date,
            unit: None,
            user_type: None,
        })
    }

    /// The active predicates. The date interval is always active.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut res = vec![Predicate::DateBetween(self.start_date, self.end_date)];
        if let Some(unit) = &self.unit {
            res.push(Predicate::UnitIs(unit.clone()));
        }
        if let Some(user_type) = &self.user_type {
            res.push(Predicate::UserTypeIs(user_type.clone()));
        }
        res
    }
}

/// Keeps the rows satisfying all the predicates.
pub fn apply_predicates<'a>(
    responses: &[&'a Response],
    predicates: &[Predicate],
) -> Vec<&'a Response> {
    responses
        .iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r)))
        .copied()
        .collect()
}

pub fn filter_responses<'a>(
    responses: &'a [Response],
    criteria: &FilterCriteria,
) -> Vec<&'a Response> {
    let all: Vec<&Response> = responses.iter().collect();
    let res = apply_predicates(&all, &criteria.predicates());
    debug!(
        "filter_responses: {} of {} responses selected by {:?}",
        res.len(),
        responses.len(),
        criteria
    );
    res
}

/// The rows of the last `window_days` days of a selection.
///
/// The window ends at the latest timestamp of the selection and never starts
/// before its earliest one. Returns `None` for an empty selection.
pub fn recent_window<'a>(
    responses: &[&'a Response],
    window_days: i64,
) -> Option<(NaiveDateTime, NaiveDateTime, Vec<&'a Response>)> {
    let t_min = responses.iter().map(|r| r.timestamp).min()?;
    let t_max = responses.iter().map(|r| r.timestamp).max()?;
    // A window reaching past the representable range starts at t_min anyway.
    let cutoff = match Duration::try_days(window_days).and_then(|d| t_max.checked_sub_signed(d)) {
        Some(t) => std::cmp::max(t, t_min),
        None => t_min,
    };
    let rows: Vec<&Response> = responses
        .iter()
        .filter(|r| r.timestamp >= cutoff)
        .copied()
        .collect();
    Some((cutoff, t_max, rows))
}

fn satisfaction_scores(responses: &[&Response]) -> Vec<Option<u8>> {
    responses.iter().map(|r| r.overall_satisfaction).collect()
}

fn recommendation_scores(responses: &[&Response]) -> Vec<Option<u8>> {
    responses.iter().map(|r| r.recommendation).collect()
}

/// Recent-window KPIs of a non-empty selection.
pub fn recent_kpis(responses: &[&Response], window_days: i64) -> Option<RecentWindow> {
    let (start, end, rows) = recent_window(responses, window_days)?;
    Some(RecentWindow {
        start,
        end,
        response_count: rows.len(),
        mean_satisfaction: mean_numeric(&satisfaction_scores(&rows)),
        nps: compute_nps(&recommendation_scores(&rows)),
    })
}

/// Flags the KPIs strictly below their target. Undefined values never flag.
pub fn compare_to_targets(
    mean_satisfaction: Option<f64>,
    nps: Option<f64>,
    settings: &DashboardSettings,
) -> TargetAlerts {
    TargetAlerts {
        satisfaction_below_target: matches!(
            mean_satisfaction,
            Some(x) if x < settings.satisfaction_target
        ),
        nps_below_target: matches!(nps, Some(x) if x < settings.nps_target),
    }
}

/// Aggregates per period bucket, oldest first.
pub fn aggregate_by_period(
    responses: &[&Response],
    granularity: Granularity,
) -> Vec<PeriodAggregate> {
    let mut groups: BTreeMap<NaiveDateTime, Vec<&Response>> = BTreeMap::new();
    for &r in responses.iter() {
        groups
            .entry(period_floor(r.timestamp, granularity))
            .or_default()
            .push(r);
    }
    groups
        .into_iter()
        .map(|(period_start, rows)| PeriodAggregate {
            period_start,
            response_count: rows.len(),
            mean_satisfaction: mean_numeric(&satisfaction_scores(&rows)),
            nps: compute_nps(&recommendation_scores(&rows)),
        })
        .collect()
}

/// Aggregates per value of a categorical field, largest group first.
///
/// Groups of equal size are ordered by key. Rows with an empty value form
/// their own group.
pub fn aggregate_by_key<F>(responses: &[&Response], key: F) -> Vec<GroupAggregate>
where
    F: Fn(&Response) -> &str,
{
    let mut groups: BTreeMap<String, Vec<&Response>> = BTreeMap::new();
    for &r in responses.iter() {
        groups.entry(key(r).to_string()).or_default().push(r);
    }
    let mut res: Vec<GroupAggregate> = groups
        .into_iter()
        .map(|(key, rows)| GroupAggregate {
            key,
            response_count: rows.len(),
            mean_satisfaction: mean_numeric(&satisfaction_scores(&rows)),
            nps: compute_nps(&recommendation_scores(&rows)),
        })
        .collect();
    // Stable: equal counts keep the key order of the map.
    res.sort_by_key(|g| std::cmp::Reverse(g.response_count));
    res
}

pub fn aggregate_by_unit(responses: &[&Response]) -> Vec<GroupAggregate> {
    aggregate_by_key(responses, |r| r.unit.as_str())
}

pub fn aggregate_by_user_type(responses: &[&Response]) -> Vec<GroupAggregate> {
    aggregate_by_key(responses, |r| r.user_type.as_str())
}

/// Mean of every dimension, highest first. Undefined means come last, in the
/// order the dimensions are asked.
pub fn summarize_dimensions(responses: &[&Response]) -> Vec<DimensionSummary> {
    let mut res: Vec<DimensionSummary> = Dimension::ALL
        .iter()
        .map(|d| {
            let scores: Vec<Option<u8>> = responses.iter().map(|r| r.score(*d)).collect();
            DimensionSummary {
                dimension: *d,
                mean: mean_numeric(&scores),
            }
        })
        .collect();
    res.sort_by(|a, b| match (a.mean, b.mean) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    res
}

/// Non-blank comments of the selection, newest first.
pub fn recent_comments(responses: &[&Response], limit: usize) -> Vec<CommentEntry> {
    let mut with_comment: Vec<&Response> = responses
        .iter()
        .filter(|r| !r.comment.trim().is_empty())
        .copied()
        .collect();
    with_comment.sort_by_key(|r| std::cmp::Reverse(r.timestamp));
    with_comment
        .iter()
        .take(limit)
        .map(|r| CommentEntry {
            timestamp: r.timestamp,
            unit: r.unit.clone(),
            user_type: r.user_type.clone(),
            comment: r.comment.trim().to_string(),
        })
        .collect()
}

fn distinct_values<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let set: BTreeSet<String> = values
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    set.into_iter().collect()
}

/// Sorted distinct non-empty units and user types.
pub fn filter_options(responses: &[Response]) -> FilterOptions {
    FilterOptions {
        units: distinct_values(responses.iter().map(|r| r.unit.as_str())),
        user_types: distinct_values(responses.iter().map(|r| r.user_type.as_str())),
    }
}

/// Runs a full dashboard pass: filter, recent KPIs, targets and aggregates.
///
/// Arguments:
/// * `responses` the full response table, in any order
/// * `criteria` the selection
/// * `granularity` the size of the timeline buckets
/// * `settings` targets and limits
pub fn build_dashboard(
    responses: &[Response],
    criteria: &FilterCriteria,
    granularity: Granularity,
    settings: &DashboardSettings,
) -> Dashboard {
    info!(
        "Building dashboard over {:?} responses, criteria: {:?}, granularity: {:?}",
        responses.len(),
        criteria,
        granularity
    );
    if responses.is_empty() {
        return Dashboard::NoResponses;
    }

    let selected = filter_responses(responses, criteria);
    let recent = match recent_kpis(&selected, settings.recent_window_days) {
        Some(x) => x,
        None => {
            info!("No data for the selection {:?}", criteria);
            return Dashboard::NoData;
        }
    };
    debug!("build_dashboard: recent window: {:?}", recent);

    let alerts = compare_to_targets(recent.mean_satisfaction, recent.nps, settings);
    if alerts.satisfaction_below_target {
        info!(
            "Mean satisfaction over the recent window is below target ({:?} < {})",
            recent.mean_satisfaction, settings.satisfaction_target
        );
    }
    if alerts.nps_below_target {
        info!(
            "NPS over the recent window is below target ({:?} < {})",
            recent.nps, settings.nps_target
        );
    }

    Dashboard::Report(Box::new(DashboardReport {
        criteria: criteria.clone(),
        granularity,
        total_responses: selected.len(),
        recent,
        alerts,
        timeline: aggregate_by_period(&selected, granularity),
        by_unit: aggregate_by_unit(&selected),
        by_user_type: aggregate_by_user_type(&selected),
        dimensions: summarize_dimensions(&selected),
        comments: recent_comments(&selected, settings.comment_limit),
    }))
}
