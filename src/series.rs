//! Historical series retrieval and best-effort forwarding to persistence.

use crate::api::ReportSource;
use crate::error::Result;
use crate::models::{Day, Observation, RegionId, StoredRecord};
use crate::storage::PersistenceGateway;
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Fetch one observation per day for `region`, concurrently.
///
/// The result has the same length and order as `days`, whatever order the responses arrive in.
/// If any single day fails, the whole call fails and nothing is forwarded. On success every
/// observation is handed to `forward` as an independent save.
pub async fn fetch_series<S>(
    source: &S,
    region: &RegionId,
    days: &[Day],
    forward: Option<&ForwardHandle>,
) -> Result<Vec<Observation>>
where
    S: ReportSource + ?Sized,
{
    let series = try_join_all(days.iter().map(|&day| source.total(region, day))).await?;

    if let Some(fwd) = forward {
        for obs in &series {
            fwd.forward(StoredRecord::from_observation(region, obs));
        }
    }
    Ok(series)
}

/// Outcome of all forwards issued through a [`Forwarder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardReport {
    pub saved: usize,
    pub failed: usize,
}

/// Cloneable sending side of a [`Forwarder`].
#[derive(Debug, Clone)]
pub struct ForwardHandle {
    tx: mpsc::UnboundedSender<StoredRecord>,
}

impl ForwardHandle {
    /// Queue a record for saving. Never blocks and never fails the caller.
    pub fn forward(&self, record: StoredRecord) {
        if let Err(e) = self.tx.send(record) {
            log::warn!("forwarder closed, dropping record {} {}", e.0.iso, e.0.date);
        }
    }
}

/// Fire-and-forget fan-out of records to a [`PersistenceGateway`].
///
/// A worker task receives records over a channel and spawns one save task per record, so a
/// slow or failing save never holds up its siblings or the query that produced it.
pub struct Forwarder {
    handle: ForwardHandle,
    worker: JoinHandle<ForwardReport>,
}

impl Forwarder {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<StoredRecord>();
        let worker = tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            let mut report = ForwardReport::default();
            loop {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(record) => {
                            let gateway = Arc::clone(&gateway);
                            tasks.spawn(async move { save_one(gateway.as_ref(), record).await });
                        }
                        None => break,
                    },
                    Some(done) = tasks.join_next(), if !tasks.is_empty() => tally(&mut report, done),
                }
            }
            while let Some(done) = tasks.join_next().await {
                tally(&mut report, done);
            }
            report
        });
        Self {
            handle: ForwardHandle { tx },
            worker,
        }
    }

    pub fn handle(&self) -> ForwardHandle {
        self.handle.clone()
    }

    /// Stop accepting records, wait for every outstanding save and report the outcome.
    ///
    /// Records sent through clones of the handle are still drained once those clones are dropped.
    pub async fn finish(self) -> ForwardReport {
        drop(self.handle);
        match self.worker.await {
            Ok(report) => report,
            Err(e) => {
                log::warn!("forwarder worker ended abnormally: {e}");
                ForwardReport::default()
            }
        }
    }
}

async fn save_one(gateway: &dyn PersistenceGateway, record: StoredRecord) -> bool {
    match gateway.save(&record).await {
        Ok(_) => true,
        Err(e) => {
            log::warn!("save {} {} failed: {e}", record.iso, record.date);
            false
        }
    }
}

fn tally(report: &mut ForwardReport, done: std::result::Result<bool, tokio::task::JoinError>) {
    match done {
        Ok(true) => report.saved += 1,
        Ok(false) => report.failed += 1,
        Err(e) => {
            log::warn!("save task aborted: {e}");
            report.failed += 1;
        }
    }
}
