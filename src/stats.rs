use crate::models::{RegionId, StoredRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive statistics over one numeric series.
///
/// `average`, `max`, `min` and `std_dev` are `None` when no usable value was seen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub missing: usize,
    pub average: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    /// Population standard deviation (divides by `count`).
    pub std_dev: Option<f64>,
}

/// Summarize a slice of reals. Non-finite entries are counted as missing.
pub fn summarize(values: &[f64]) -> Summary {
    summarize_present(values.iter().map(|v| v.is_finite().then_some(*v)))
}

/// Summarize a series where some values may be absent.
pub fn summarize_present<I>(values: I) -> Summary
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut vals = Vec::new();
    let mut missing = 0;
    for v in values {
        match v {
            Some(x) if x.is_finite() => vals.push(x),
            _ => missing += 1,
        }
    }

    let count = vals.len();
    if count == 0 {
        return Summary {
            missing,
            ..Summary::default()
        };
    }

    let n = count as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let variance = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = vals.iter().copied().fold(f64::INFINITY, f64::min);

    Summary {
        count,
        missing,
        average: Some(mean),
        max: Some(max),
        min: Some(min),
        std_dev: Some(variance.sqrt()),
    }
}

/// Convenience for integer counts, e.g. `snapshots.iter().map(|s| s.confirmed)`.
pub fn summarize_counts<I>(counts: I) -> Summary
where
    I: IntoIterator<Item = Option<u64>>,
{
    summarize_present(counts.into_iter().map(|c| c.map(|c| c as f64)))
}

/// Persisted history summarized per region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionSummary {
    pub region: RegionId,
    pub days: usize,
    pub confirmed: Summary,
    pub deaths: Summary,
}

/// Group stored records by region and summarize confirmed and deaths for each.
///
/// Output is ordered by region code.
pub fn grouped_summary(records: &[StoredRecord]) -> Vec<RegionSummary> {
    let mut groups: BTreeMap<&RegionId, Vec<&StoredRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(&r.iso).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(region, rows)| RegionSummary {
            region: region.clone(),
            days: rows.len(),
            confirmed: summarize_counts(rows.iter().map(|r| r.confirmed)),
            deaths: summarize_counts(rows.iter().map(|r| r.deaths)),
        })
        .collect()
}
