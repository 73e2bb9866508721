//! On-demand aggregation of visit records into a per-code summary.
//!
//! Nothing is precomputed: `analyze` scans the stored visit records of one
//! code. Modal time buckets are multi-modal (ties return every tied value),
//! and top-N lists break count ties by first appearance in storage order,
//! which is stable across repeated calls for the same data.

use anyhow::Result;
use chrono::{Datelike, Timelike};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::storage::Storage;
use crate::timefmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: u64,
}

/// Summary statistics over all visit records of one short code.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VisitSummary {
    pub total_entries: u64,
    pub unique_visitors: u64,
    /// Raw entry timestamps, in insertion order.
    pub entries: Vec<String>,
    /// Modal hour(s) of day, all tied values.
    pub top_hours: Vec<u32>,
    /// Modal day(s) of month, all tied values.
    pub top_days: Vec<u32>,
    /// Modal month(s) of year, all tied values.
    pub top_months: Vec<u32>,
    /// Mean response time in seconds; `None` with zero records.
    pub average_response_time: Option<f64>,
    pub top_platforms: Vec<CategoryCount>,
    pub top_browsers: Vec<CategoryCount>,
    pub top_countries: Vec<CategoryCount>,
    pub top_regions: Vec<CategoryCount>,
    pub top_cities: Vec<CategoryCount>,
    /// Mean client-server great-circle distance in kilometers.
    pub average_distance_km: Option<f64>,
}

pub struct AnalyticsAggregator {
    storage: Arc<dyn Storage>,
}

impl AnalyticsAggregator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Compute the summary for one code. Zero visit records yield empty
    /// aggregates, not an error.
    pub async fn analyze(&self, code: &str) -> Result<VisitSummary> {
        let visits = self.storage.visits_for(code).await?;
        let unique_visitors = self.storage.unique_visitor_count(code).await?;

        let mut hours = Vec::with_capacity(visits.len());
        let mut days = Vec::with_capacity(visits.len());
        let mut months = Vec::with_capacity(visits.len());
        for visit in &visits {
            // Rows written before a format change would fail to parse; they
            // are skipped rather than poisoning the whole summary.
            if let Ok(t) = timefmt::parse_entry(&visit.entry_time) {
                hours.push(t.hour());
                days.push(t.day());
                months.push(t.month());
            }
        }

        Ok(VisitSummary {
            total_entries: visits.len() as u64,
            unique_visitors: unique_visitors.max(0) as u64,
            entries: visits.iter().map(|v| v.entry_time.clone()).collect(),
            top_hours: multimode(hours),
            top_days: multimode(days),
            top_months: multimode(months),
            average_response_time: mean(visits.iter().map(|v| v.response_time.as_str())),
            top_platforms: top_n(visits.iter().map(|v| v.platform.as_str()), 3),
            top_browsers: top_n(visits.iter().map(|v| v.browser.as_str()), 3),
            top_countries: top_n(visits.iter().map(|v| v.country.as_str()), 10),
            top_regions: top_n(visits.iter().map(|v| v.region.as_str()), 10),
            top_cities: top_n(visits.iter().map(|v| v.city.as_str()), 10),
            average_distance_km: mean(visits.iter().map(|v| v.distance.as_str())),
        })
    }
}

/// All most-frequent values, in first-seen order. Empty input gives an
/// empty result.
fn multimode<T: Eq + Hash + Clone>(values: Vec<T>) -> Vec<T> {
    let mut counts: HashMap<T, u64> = HashMap::new();
    let mut order: Vec<T> = Vec::new();

    for value in values {
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let max = counts.values().copied().max().unwrap_or(0);
    order.into_iter().filter(|v| counts[v] == max).collect()
}

/// Top `n` values by descending count. Ties are broken by first appearance
/// in the input (a stable sort over first-seen order).
fn top_n<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<CategoryCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for value in values {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    order.sort_by_key(|v| std::cmp::Reverse(counts[v]));
    order
        .into_iter()
        .take(n)
        .map(|v| CategoryCount {
            value: v.to_string(),
            count: counts[v],
        })
        .collect()
}

/// Mean of the parseable numeric strings; `None` when nothing parses.
fn mean<'a>(values: impl Iterator<Item = &'a str>) -> Option<f64> {
    let parsed: Vec<f64> = values.filter_map(|s| s.parse::<f64>().ok()).collect();
    if parsed.is_empty() {
        return None;
    }
    Some(parsed.iter().sum::<f64>() / parsed.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multimode_returns_all_tied_values_in_first_seen_order() {
        assert_eq!(multimode(vec![3, 1, 3, 1, 2]), vec![3, 1]);
        assert_eq!(multimode(vec![5, 5, 2]), vec![5]);
        assert_eq!(multimode(Vec::<u32>::new()), Vec::<u32>::new());
    }

    #[test]
    fn top_n_sorts_by_count_then_first_seen() {
        let values = ["b", "a", "b", "a", "c"];
        let top = top_n(values.into_iter(), 3);
        assert_eq!(
            top,
            vec![
                CategoryCount {
                    value: "b".to_string(),
                    count: 2
                },
                CategoryCount {
                    value: "a".to_string(),
                    count: 2
                },
                CategoryCount {
                    value: "c".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn top_n_truncates_to_n() {
        let values = ["a", "b", "c", "d"];
        assert_eq!(top_n(values.into_iter(), 3).len(), 3);
    }

    #[test]
    fn mean_skips_unparseable_and_handles_empty() {
        assert_eq!(mean(["1.0", "3.0"].into_iter()), Some(2.0));
        assert_eq!(mean(["1.0", "junk"].into_iter()), Some(1.0));
        assert_eq!(mean(std::iter::empty::<&str>()), None);
    }
}
