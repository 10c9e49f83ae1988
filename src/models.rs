use crate::error::Error;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// A calendar day; `Display` and serde both use the canonical `YYYY-MM-DD` form.
pub type Day = NaiveDate;

static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_-]{2,8}$").expect("static region pattern"));

/// Short code naming a country or subdivision (e.g. `USA`, `DEU`).
///
/// Parsing trims whitespace and upper-cases, so `" usa "` and `"USA"` are the same region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RegionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if REGION_RE.is_match(&code) {
            Ok(RegionId(code))
        } else {
            Err(Error::InvalidRegion(s.to_string()))
        }
    }
}

impl TryFrom<String> for RegionId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RegionId> for String {
    fn from(r: RegionId) -> Self {
        r.0
    }
}

impl AsRef<str> for RegionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One day of a region's history.
///
/// A count is `None` when the upstream had no report for the day or sent something
/// that is not a non-negative integer. `deaths <= confirmed` is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub day: Day,
    pub confirmed: Option<u64>,
    pub deaths: Option<u64>,
}

impl Observation {
    /// Build the observation for `day` from a `/reports/total` payload.
    ///
    /// The day is always the requested one; the payload's own `date` is ignored.
    pub fn from_payload(day: Day, payload: TotalPayload) -> Self {
        match payload {
            TotalPayload::Report(t) => Observation {
                day,
                confirmed: t.confirmed,
                deaths: t.deaths,
            },
            TotalPayload::Empty(_) => Observation {
                day,
                confirmed: None,
                deaths: None,
            },
        }
    }
}

/// Point-in-time aggregate for a region or one of its subdivisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub region: RegionId,
    pub name: String,
    pub province: Option<String>,
    pub confirmed: u64,
    pub deaths: u64,
    pub active: Option<u64>,
}

impl RegionSnapshot {
    /// Province for subdivision rows, country name otherwise.
    pub fn label(&self) -> &str {
        self.province.as_deref().unwrap_or(&self.name)
    }

    pub fn is_country_total(&self) -> bool {
        self.province.is_none()
    }
}

/// Parameters of a `/reports` request. Both filters are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub region: Option<RegionId>,
    pub day: Option<Day>,
}

impl ReportQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn region(region: RegionId) -> Self {
        Self {
            region: Some(region),
            day: None,
        }
    }
}

/// Envelope of `/reports`: `{ "data": [ ReportEntry, ... ] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsEnvelope {
    #[serde(default)]
    pub data: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionInfo {
    pub iso: String,
    pub name: String,
    #[serde(default, deserialize_with = "de_blank_as_none")]
    pub province: Option<String>,
}

/// Raw row of `/reports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(default, deserialize_with = "de_count")]
    pub confirmed: Option<u64>,
    #[serde(default, deserialize_with = "de_count")]
    pub deaths: Option<u64>,
    #[serde(default, deserialize_with = "de_count")]
    pub active: Option<u64>,
    pub region: RegionInfo,
}

impl ReportEntry {
    /// Convert to a snapshot; `None` when the region code or a required count is unusable.
    pub fn into_snapshot(self) -> Option<RegionSnapshot> {
        let region = self.region.iso.parse().ok()?;
        Some(RegionSnapshot {
            region,
            name: self.region.name,
            province: self.region.province,
            confirmed: self.confirmed?,
            deaths: self.deaths?,
            active: self.active,
        })
    }
}

/// Envelope of `/reports/total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalEnvelope {
    pub data: TotalPayload,
}

/// The upstream sends an object for a reported day and `[]` when it has nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalPayload {
    Empty(Vec<serde_json::Value>),
    Report(DailyTotal),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTotal {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "de_count")]
    pub confirmed: Option<u64>,
    #[serde(default, deserialize_with = "de_count")]
    pub deaths: Option<u64>,
    #[serde(default, deserialize_with = "de_count")]
    pub active: Option<u64>,
}

/// Persistence wire shape, one document per (region, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub iso: RegionId,
    pub date: Day,
    #[serde(default, deserialize_with = "de_count")]
    pub confirmed: Option<u64>,
    #[serde(default, deserialize_with = "de_count")]
    pub deaths: Option<u64>,
}

impl StoredRecord {
    pub fn from_observation(region: &RegionId, obs: &Observation) -> Self {
        Self {
            id: None,
            iso: region.clone(),
            date: obs.day,
            confirmed: obs.confirmed,
            deaths: obs.deaths,
        }
    }
}

/// Serde helper: read a count from a JSON number, a numeric string or null.
///
/// Anything that is not a non-negative whole number becomes `None` instead of an error.
fn de_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct CountVisitor;

    impl<'de> Visitor<'de> for CountVisitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a non-negative count as number, string or null")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(u64::try_from(v).ok())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
                Ok(Some(v as u64))
            } else {
                Ok(None)
            }
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
            Ok(s.trim().parse::<u64>().ok())
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(CountVisitor)
}

fn de_blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}
