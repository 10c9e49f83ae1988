use crate::api::{Client, DEFAULT_BASE_URL};
use crate::dates::MIN_DAY;
use crate::models::Day;
use crate::storage::{HttpGateway, JsonlStore, PersistenceGateway};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where fetched history is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    None,
    Http(String),
    File(PathBuf),
}

/// Runtime settings, filled from CLI flags and environment by the binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base: String,
    pub store: StoreTarget,
    pub locale: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Upper bound for a whole query cycle; `None` leaves it to the per-request timeout.
    pub cycle_timeout: Option<Duration>,
    pub min_day: Day,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_BASE_URL.into(),
            store: StoreTarget::None,
            locale: "en".into(),
            timeout: Duration::from_secs(30),
            cycle_timeout: Some(Duration::from_secs(120)),
            min_day: MIN_DAY,
        }
    }
}

impl Settings {
    pub fn client(&self) -> Client {
        Client::with_timeout(&self.api_base, self.timeout)
    }

    pub fn gateway(&self) -> Option<Arc<dyn PersistenceGateway>> {
        match &self.store {
            StoreTarget::None => None,
            StoreTarget::Http(url) => Some(Arc::new(HttpGateway::new(url))),
            StoreTarget::File(path) => Some(Arc::new(JsonlStore::new(path))),
        }
    }
}
