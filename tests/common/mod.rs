#![allow(dead_code)]

use async_trait::async_trait;
use covid_stats::error::{Error, SourceFailure};
use covid_stats::models::{ReportQuery, StoredRecord};
use covid_stats::storage::PersistenceGateway;
use covid_stats::{Day, Observation, RegionId, RegionSnapshot, ReportSource, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn day(s: &str) -> Day {
    covid_stats::dates::parse_day(s).unwrap()
}

pub fn region(s: &str) -> RegionId {
    s.parse().unwrap()
}

pub fn snap(iso: &str, province: Option<&str>, confirmed: u64, deaths: u64) -> RegionSnapshot {
    RegionSnapshot {
        region: region(iso),
        name: format!("Country {iso}"),
        province: province.map(str::to_string),
        confirmed,
        deaths,
        active: None,
    }
}

/// In-process source: confirmed grows by 10 per day since 2020-01-22, deaths by 1.
///
/// Later days answer sooner, so completions arrive in reverse request order.
pub struct FakeSource {
    pub snapshots: Vec<RegionSnapshot>,
    pub fail_on: Option<Day>,
    pub total_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            fail_on: None,
            total_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(day: Day) -> Self {
        Self {
            fail_on: Some(day),
            ..Self::new()
        }
    }

    pub fn with_snapshots(snapshots: Vec<RegionSnapshot>) -> Self {
        Self {
            snapshots,
            ..Self::new()
        }
    }

    pub fn offset(d: Day) -> u64 {
        (d - covid_stats::dates::MIN_DAY).num_days().max(0) as u64
    }
}

#[async_trait]
impl ReportSource for FakeSource {
    async fn reports(&self, query: &ReportQuery) -> Result<Vec<RegionSnapshot>> {
        Ok(self
            .snapshots
            .iter()
            .filter(|s| query.region.as_ref().is_none_or(|r| *r == s.region))
            .cloned()
            .collect())
    }

    async fn total(&self, _region: &RegionId, day: Day) -> Result<Observation> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let off = Self::offset(day);
        tokio::time::sleep(Duration::from_millis(500u64.saturating_sub(off * 10))).await;
        if self.fail_on == Some(day) {
            return Err(Error::SourceUnavailable {
                url: format!("fake://total/{day}"),
                source: SourceFailure::TimedOut,
            });
        }
        Ok(Observation {
            day,
            confirmed: Some(10 + off * 10),
            deaths: Some(off),
        })
    }
}

/// Gateway that rejects one day and stores the rest in memory.
pub struct FlakyGateway {
    pub reject: Day,
    pub inner: covid_stats::storage::MemoryStore,
}

#[async_trait]
impl PersistenceGateway for FlakyGateway {
    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
        if record.date == self.reject {
            return Err(Error::Persistence {
                target: "flaky".into(),
                reason: "rejected".into(),
            });
        }
        self.inner.save(record).await
    }

    async fn retrieve(&self, region: &RegionId) -> Result<Vec<StoredRecord>> {
        self.inner.retrieve(region).await
    }
}
