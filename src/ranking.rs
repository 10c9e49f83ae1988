//! Rankings over region snapshots. Every function returns a new vector and leaves its input alone.

use crate::models::RegionSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Confirmed,
    Deaths,
}

impl Metric {
    pub fn of(self, s: &RegionSnapshot) -> u64 {
        match self {
            Metric::Confirmed => s.confirmed,
            Metric::Deaths => s.deaths,
        }
    }
}

/// First `n` snapshots by `metric`, descending. Ties keep their input order.
pub fn top_n(snapshots: &[RegionSnapshot], metric: Metric, n: usize) -> Vec<RegionSnapshot> {
    let mut ranked: Vec<&RegionSnapshot> = snapshots.iter().collect();
    ranked.sort_by(|a, b| metric.of(b).cmp(&metric.of(a)));
    ranked.into_iter().take(n).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRank {
    pub snapshot: RegionSnapshot,
    /// deaths / confirmed
    pub ratio: f64,
}

/// First `n` snapshots by deaths-to-confirmed ratio, descending.
///
/// Snapshots with zero confirmed cases have no ratio and are left out.
pub fn rank_by_ratio(snapshots: &[RegionSnapshot], n: usize) -> Vec<RatioRank> {
    let mut ranked: Vec<RatioRank> = snapshots
        .iter()
        .filter(|s| s.confirmed > 0)
        .map(|s| RatioRank {
            snapshot: s.clone(),
            ratio: s.deaths as f64 / s.confirmed as f64,
        })
        .collect();
    ranked.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
    ranked.truncate(n);
    ranked
}

/// Country-level rows only (entries without a province).
pub fn country_totals(snapshots: &[RegionSnapshot]) -> Vec<RegionSnapshot> {
    snapshots
        .iter()
        .filter(|s| s.is_country_total())
        .cloned()
        .collect()
}
