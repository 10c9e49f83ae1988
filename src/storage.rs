//! Persistence of fetched history and file export.
//!
//! [`PersistenceGateway`] is the save/retrieve seam. [`HttpGateway`] talks to the document
//! store service (`POST /api/save`, `GET /api/data/{iso}`), [`JsonlStore`] appends to a local
//! JSON-lines file and [`MemoryStore`] keeps everything in process.

use crate::error::{Error, Result};
use crate::models::{RegionId, StoredRecord};
use crate::trend::IndexedSeries;
use ahash::AHashMap;
use async_trait::async_trait;
use csv::WriterBuilder;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Store one record and return it as stored.
    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord>;

    /// All stored records for `region`, in storage order.
    async fn retrieve(&self, region: &RegionId) -> Result<Vec<StoredRecord>>;
}

// Allow -, _, . unescaped in codes
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

pub(crate) fn encode_segment(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s.trim(), SAFE).to_string()
}

/// Client for the document store service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    pub base_url: String,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: crate::api::build_http(Duration::from_secs(30)),
        }
    }
}

#[async_trait]
impl PersistenceGateway for HttpGateway {
    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
        let url = format!("{}/api/save", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| Error::persistence(&url, e))?;
        if !resp.status().is_success() {
            return Err(Error::persistence(&url, format!("HTTP {}", resp.status())));
        }
        resp.json().await.map_err(|e| Error::persistence(&url, e))
    }

    async fn retrieve(&self, region: &RegionId) -> Result<Vec<StoredRecord>> {
        let url = format!("{}/api/data/{}", self.base_url, encode_segment(region.as_str()));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::persistence(&url, e))?;
        if !resp.status().is_success() {
            return Err(Error::persistence(&url, format!("HTTP {}", resp.status())));
        }
        let documents: Vec<serde_json::Value> =
            resp.json().await.map_err(|e| Error::persistence(&url, e))?;
        Ok(records_from_documents(&url, documents))
    }
}

/// Decode stored documents one by one, skipping those that are not valid records.
pub(crate) fn records_from_documents(
    origin: &str,
    documents: Vec<serde_json::Value>,
) -> Vec<StoredRecord> {
    documents
        .into_iter()
        .enumerate()
        .filter_map(|(i, doc)| match serde_json::from_value::<StoredRecord>(doc) {
            Ok(r) => Some(r),
            Err(e) => {
                log::warn!("{origin}: skipping bad document #{}: {e}", i + 1);
                None
            }
        })
        .collect()
}

/// Append-only JSON-lines file, one [`StoredRecord`] per line.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    // serializes appends so lines never interleave
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PersistenceGateway for JsonlStore {
    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        f.write_all(&line).await?;
        f.flush().await?;
        Ok(record.clone())
    }

    async fn retrieve(&self, region: &RegionId) -> Result<Vec<StoredRecord>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredRecord>(line) {
                Ok(r) if &r.iso == region => out.push(r),
                Ok(_) => {}
                Err(e) => log::warn!("{}:{}: skipping bad record: {e}", self.path.display(), lineno + 1),
            }
        }
        Ok(out)
    }
}

/// In-process store keyed by region. Assigns sequential ids on save.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<AHashMap<RegionId, Vec<StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all regions.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|m| m.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
        let mut map = self
            .inner
            .lock()
            .map_err(|e| Error::persistence("memory", e))?;
        let next_id = map.values().map(Vec::len).sum::<usize>() + 1;
        let stored = StoredRecord {
            id: Some(next_id.to_string()),
            ..record.clone()
        };
        map.entry(record.iso.clone()).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn retrieve(&self, region: &RegionId) -> Result<Vec<StoredRecord>> {
        let map = self
            .inner
            .lock()
            .map_err(|e| Error::persistence("memory", e))?;
        Ok(map.get(region).cloned().unwrap_or_default())
    }
}

/// Prefix cells that a spreadsheet would evaluate as a formula.
fn guard_cell(s: &str) -> String {
    if s.starts_with(['=', '+', '-', '@']) {
        format!("'{s}")
    } else {
        s.to_string()
    }
}

/// Save an indexed series as CSV with header.
pub fn save_csv<P: AsRef<Path>>(region: &RegionId, series: &IndexedSeries, path: P) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.serialize((
        "iso",
        "date",
        "index",
        "confirmed",
        "deaths",
        "confirmed_trend",
        "deaths_trend",
    ))?;
    let iso = guard_cell(region.as_str());
    for p in &series.points {
        wtr.serialize((
            &iso,
            p.day.to_string(),
            p.index,
            p.confirmed,
            p.deaths,
            p.confirmed_trend,
            p.deaths_trend,
        ))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save an indexed series as pretty JSON.
pub fn save_json<P: AsRef<Path>>(series: &IndexedSeries, path: P) -> Result<()> {
    let mut f = File::create(path)?;
    let s = serde_json::to_string_pretty(series)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}
