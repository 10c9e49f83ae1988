//! Async client for the **covid-api.com** reporting API.
//!
//! Two endpoints are used:
//! - `/reports` for point-in-time snapshots, optionally filtered by `iso` and/or `date`
//! - `/reports/total` for one region's aggregate on one day
//!
//! ### Notes
//! - Counts are read leniently; an unreadable count becomes "absent" instead of failing the request.
//! - A day without a report comes back as `{"data": []}` and maps to an observation with no counts.
//! - Timeouts default to 30s per request (10s connect); see [`Client::with_timeout`].
//!
//! Typical usage:
//! ```no_run
//! # use covid_stats::{Client, ReportSource, models::ReportQuery};
//! # async fn run() -> covid_stats::Result<()> {
//! let client = Client::default();
//! let usa = client.reports(&ReportQuery::region("USA".parse()?)).await?;
//! # Ok(())
//! # }
//! ```
use crate::error::{Error, Result, SourceFailure};
use crate::models::{
    Day, Observation, RegionId, RegionSnapshot, ReportQuery, ReportsEnvelope, TotalEnvelope,
};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://covid-api.com/api";

// Pauses between attempts: three attempts in total, none after the last.
const RETRY_BACKOFF_MS: [u64; 2] = [100, 300];

/// Upstream data source. [`Client`] talks HTTP; tests substitute in-process fakes.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Snapshots matching `query`, one per region/subdivision row.
    async fn reports(&self, query: &ReportQuery) -> Result<Vec<RegionSnapshot>>;

    /// The region's aggregate totals on `day`.
    async fn total(&self, region: &RegionId, day: Day) -> Result<Observation>;
}

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: build_http(timeout),
        }
    }

    /// GET `url` and decode JSON, retrying network errors and 5xx with a short backoff.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut last_err: Option<SourceFailure> = None;
        for attempt in 0..=RETRY_BACKOFF_MS.len() {
            match self.http.get(url).send().await {
                Ok(r) if r.status().is_success() => {
                    let body = r.bytes().await.map_err(|e| Error::unavailable(url, e))?;
                    return serde_json::from_slice(&body).map_err(|e| Error::unavailable(url, e));
                }
                Ok(r) if r.status().is_server_error() => {
                    log::warn!("GET {url}: HTTP {} (attempt {})", r.status(), attempt + 1);
                    last_err = Some(SourceFailure::Status(r.status()));
                }
                Ok(r) => return Err(Error::unavailable(url, SourceFailure::Status(r.status()))),
                Err(e) => {
                    log::warn!("GET {url}: {e} (attempt {})", attempt + 1);
                    last_err = Some(e.into());
                }
            }
            if let Some(&pause_ms) = RETRY_BACKOFF_MS.get(attempt) {
                tokio::time::sleep(Duration::from_millis(pause_ms)).await;
            }
        }
        Err(Error::unavailable(
            url,
            last_err.unwrap_or(SourceFailure::TimedOut),
        ))
    }

    fn reports_url(&self, query: &ReportQuery) -> String {
        let mut params = Vec::new();
        if let Some(day) = query.day {
            params.push(format!("date={day}"));
        }
        if let Some(region) = &query.region {
            params.push(format!("iso={}", crate::storage::encode_segment(region.as_str())));
        }
        if params.is_empty() {
            format!("{}/reports", self.base_url)
        } else {
            format!("{}/reports?{}", self.base_url, params.join("&"))
        }
    }
}

pub(crate) fn build_http(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout) // total request timeout
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(5))
        .user_agent(concat!("covid_stats/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("reqwest client build")
}

#[async_trait]
impl ReportSource for Client {
    async fn reports(&self, query: &ReportQuery) -> Result<Vec<RegionSnapshot>> {
        let url = self.reports_url(query);
        log::debug!("GET {url}");
        let envelope: ReportsEnvelope = self.get_json(&url).await?;

        let total = envelope.data.len();
        let snapshots: Vec<RegionSnapshot> = envelope
            .data
            .into_iter()
            .filter_map(|e| e.into_snapshot())
            .collect();
        if snapshots.len() < total {
            log::debug!(
                "{url}: skipped {} of {total} rows with unreadable region or counts",
                total - snapshots.len()
            );
        }
        Ok(snapshots)
    }

    async fn total(&self, region: &RegionId, day: Day) -> Result<Observation> {
        let url = format!(
            "{}/reports/total?date={day}&iso={}",
            self.base_url,
            crate::storage::encode_segment(region.as_str())
        );
        log::debug!("GET {url}");
        let envelope: TotalEnvelope = self.get_json(&url).await?;
        Ok(Observation::from_payload(day, envelope.data))
    }
}
