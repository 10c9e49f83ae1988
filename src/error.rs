use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why an upstream retrieval produced no usable data.
#[derive(Debug, Error)]
pub enum SourceFailure {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request failed with HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("timed out")]
    TimedOut,
}

#[derive(Debug, Error)]
pub enum Error {
    /// An individual or composite upstream retrieval failed; the query cycle has no data.
    #[error("data unavailable ({url}): {source}")]
    SourceUnavailable {
        url: String,
        #[source]
        source: SourceFailure,
    },

    /// Not enough points to compute a result (e.g. a trend over fewer than 2 distinct indices).
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// A persistence save or retrieval failed.
    #[error("persistence failed ({target}): {reason}")]
    Persistence { target: String, reason: String },

    #[error("invalid region identifier {0:?}")]
    InvalidRegion(String),

    #[error("invalid day {input:?}, expected YYYY-MM-DD")]
    InvalidDay {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unavailable(url: impl Into<String>, source: impl Into<SourceFailure>) -> Self {
        Error::SourceUnavailable {
            url: url.into(),
            source: source.into(),
        }
    }

    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        Error::InsufficientData {
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(target: impl Into<String>, reason: impl ToString) -> Self {
        Error::Persistence {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the failure means "no data for this cycle" rather than a programming or I/O fault.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::SourceUnavailable { .. })
    }
}
