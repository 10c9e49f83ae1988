//! covid_stats
//!
//! Fetches pandemic case/death statistics from the covid-api.com reporting API, forwards
//! fetched history to a document store, and derives analytics from it. Pairs with the
//! `covid-stats` CLI.
//!
//! ### Features
//! - Expand a date range into calendar days and fetch one observation per day, concurrently
//! - Descriptive statistics (mean, min, max, population standard deviation)
//! - Least-squares trend lines projected over the series
//! - Top-N and death-to-confirmed rankings over region snapshots
//! - Best-effort persistence of every fetched point (HTTP store, JSON-lines file, memory)
//!
//! ### Example
//! ```no_run
//! use covid_stats::{Client, dates, query};
//!
//! # async fn run() -> covid_stats::Result<()> {
//! let client = Client::default();
//! let ctx = query::QueryContext::new(
//!     "USA".parse()?,
//!     dates::parse_day("2020-03-01")?,
//!     dates::parse_day("2020-03-31")?,
//! );
//! let view = query::load_history(&client, &ctx, None).await?;
//! println!("{:?}", view.series.confirmed_trend);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod dates;
pub mod error;
pub mod format;
pub mod models;
pub mod query;
pub mod ranking;
pub mod series;
pub mod stats;
pub mod storage;
pub mod trend;

pub use api::{Client, ReportSource};
pub use error::{Error, Result};
pub use models::{Day, Observation, RegionId, RegionSnapshot};
