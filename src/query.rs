//! Query cycles: one (region, date range) selection, the views derived from it, and the
//! generation bookkeeping that keeps late results from overwriting newer ones.

use crate::api::ReportSource;
use crate::dates::{MIN_DAY, expand};
use crate::error::{Error, Result, SourceFailure};
use crate::models::{Day, RegionId, RegionSnapshot, ReportQuery};
use crate::ranking::{Metric, RatioRank, country_totals, rank_by_ratio, top_n};
use crate::series::{ForwardHandle, fetch_series};
use crate::stats::{Summary, summarize_counts};
use crate::trend::{IndexedSeries, index_series};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The user's current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryContext {
    pub region: RegionId,
    pub start: Day,
    pub end: Day,
    /// Earliest day the range may start on; earlier starts are clamped.
    pub min_day: Day,
}

impl QueryContext {
    pub fn new(region: RegionId, start: Day, end: Day) -> Self {
        Self {
            region,
            start,
            end,
            min_day: MIN_DAY,
        }
    }

    pub fn days(&self) -> Vec<Day> {
        expand(self.start, self.end, self.min_day)
    }
}

/// Historical series of one region with its trend lines and statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub context: QueryContext,
    pub series: IndexedSeries,
    pub confirmed: Summary,
    pub deaths: Summary,
}

/// Current per-subdivision totals of one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionsView {
    pub region: RegionId,
    pub snapshots: Vec<RegionSnapshot>,
    pub top_confirmed: Vec<RegionSnapshot>,
    pub top_deaths: Vec<RegionSnapshot>,
    pub confirmed: Summary,
    pub deaths: Summary,
}

/// Country-level totals and the death-to-confirmed ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountriesView {
    pub countries: Vec<RegionSnapshot>,
    pub by_ratio: Vec<RatioRank>,
}

/// Everything one query cycle shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleView {
    pub regions: RegionsView,
    pub history: HistoryView,
}

pub async fn load_history<S>(
    source: &S,
    context: &QueryContext,
    forward: Option<&ForwardHandle>,
) -> Result<HistoryView>
where
    S: ReportSource + ?Sized,
{
    let days = context.days();
    let observations = fetch_series(source, &context.region, &days, forward).await?;
    let series = index_series(&observations);
    Ok(HistoryView {
        context: context.clone(),
        confirmed: summarize_counts(observations.iter().map(|o| o.confirmed)),
        deaths: summarize_counts(observations.iter().map(|o| o.deaths)),
        series,
    })
}

pub async fn load_regions<S>(source: &S, region: &RegionId, top: usize) -> Result<RegionsView>
where
    S: ReportSource + ?Sized,
{
    let snapshots = source.reports(&ReportQuery::region(region.clone())).await?;
    Ok(RegionsView {
        region: region.clone(),
        top_confirmed: top_n(&snapshots, Metric::Confirmed, top),
        top_deaths: top_n(&snapshots, Metric::Deaths, top),
        confirmed: summarize_counts(snapshots.iter().map(|s| Some(s.confirmed))),
        deaths: summarize_counts(snapshots.iter().map(|s| Some(s.deaths))),
        snapshots,
    })
}

pub async fn load_countries<S>(source: &S, top: usize) -> Result<CountriesView>
where
    S: ReportSource + ?Sized,
{
    let all = source.reports(&ReportQuery::all()).await?;
    let countries = country_totals(&all);
    Ok(CountriesView {
        by_ratio: rank_by_ratio(&countries, top),
        countries,
    })
}

/// Load the subdivision snapshot and the history of one selection side by side.
pub async fn load_cycle<S>(
    source: &S,
    context: &QueryContext,
    top: usize,
    forward: Option<&ForwardHandle>,
) -> Result<CycleView>
where
    S: ReportSource + ?Sized,
{
    let (regions, history) = tokio::try_join!(
        load_regions(source, &context.region, top),
        load_history(source, context, forward),
    )?;
    Ok(CycleView { regions, history })
}

/// Bound `fut` by `limit`; an expired cycle is reported as unavailable data.
pub async fn within<T, F>(limit: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(d) => match tokio::time::timeout(d, fut).await {
            Ok(r) => r,
            Err(_) => Err(Error::unavailable(what, SourceFailure::TimedOut)),
        },
    }
}

/// Proof that a cycle was started; carries its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    generation: u64,
    pub context: QueryContext,
}

impl QueryTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What the dashboard currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Loading { generation: u64 },
    Ready { generation: u64, view: Arc<CycleView> },
    /// The last cycle failed; earlier results are not kept.
    Unavailable { generation: u64, reason: String },
}

/// Owner of the displayed state. Every new selection supersedes the previous one, and results
/// from a superseded cycle are dropped on arrival.
#[derive(Debug)]
pub struct Dashboard {
    generation: u64,
    state: ViewState,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            generation: 0,
            state: ViewState::Idle,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Start a new cycle for `context`, superseding any cycle still in flight.
    pub fn begin(&mut self, context: QueryContext) -> QueryTicket {
        self.generation += 1;
        self.state = ViewState::Loading {
            generation: self.generation,
        };
        QueryTicket {
            generation: self.generation,
            context,
        }
    }

    pub fn is_current(&self, ticket: &QueryTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply a finished cycle. Returns `false`, leaving the state untouched, if `ticket` is stale.
    pub fn complete(&mut self, ticket: &QueryTicket, outcome: Result<CycleView>) -> bool {
        if !self.is_current(ticket) {
            log::warn!(
                "dropping stale result for {} (generation {}, current {})",
                ticket.context.region,
                ticket.generation,
                self.generation
            );
            return false;
        }
        self.state = match outcome {
            Ok(view) => {
                log::info!(
                    "{}: {} day(s), {} subdivision(s)",
                    ticket.context.region,
                    view.history.series.points.len(),
                    view.regions.snapshots.len()
                );
                ViewState::Ready {
                    generation: ticket.generation,
                    view: Arc::new(view),
                }
            }
            Err(e) => ViewState::Unavailable {
                generation: ticket.generation,
                reason: e.to_string(),
            },
        };
        true
    }
}
