//! State shared between the orchestrator, its intake thread and every pipeline thread.

use log::{debug, info};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use super::runner::PipelineRunner;
use crate::engine::filter::PathFilter;
use crate::engine::registry::{Claim, InFlightRegistry};
use crate::{ChangeEvent, PipelineRecord, Rejection, WatchedPath};

/// Snapshot returned by [`Orchestrator::status`](super::Orchestrator::status).
#[derive(Clone, Debug, Serialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub watch_directory: Option<PathBuf>,
    pub in_flight: usize,
    /// Runs finished since the orchestrator was built.
    pub total_pipelines: u64,
    pub supported_extensions: Vec<String>,
    pub max_file_size_bytes: u64,
}

/// Most recent finished runs, oldest first, capped at `capacity`.
pub(crate) struct History {
    records: VecDeque<PipelineRecord>,
    capacity: usize,
    total: u64,
}

impl History {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            total: 0,
        }
    }

    fn push(&mut self, record: PipelineRecord) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

pub(crate) struct Shared {
    pub(crate) filter: PathFilter,
    pub(crate) registry: Arc<InFlightRegistry>,
    pub(crate) runner: PipelineRunner,
    history: Mutex<History>,
}

impl Shared {
    pub(crate) fn new(filter: PathFilter, runner: PipelineRunner, history_capacity: usize) -> Self {
        Self {
            filter,
            registry: Arc::new(InFlightRegistry::new()),
            runner,
            history: Mutex::new(History::new(history_capacity)),
        }
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn history_snapshot(&self) -> Vec<PipelineRecord> {
        self.history().records.iter().cloned().collect()
    }

    pub(crate) fn total_pipelines(&self) -> u64 {
        self.history().total
    }

    /// Stat `path` and apply the filter. An unreadable path is a soft skip.
    pub(crate) fn inspect(&self, path: &Path) -> Result<WatchedPath, Rejection> {
        let path = path.canonicalize().map_err(|_| Rejection::Missing)?;
        let meta = std::fs::metadata(&path).map_err(|_| Rejection::Missing)?;
        if !meta.is_file() {
            return Err(Rejection::Missing);
        }
        let watched = WatchedPath {
            size: meta.len(),
            path,
        };
        if self.filter.should_process(&watched.path, watched.size) {
            Ok(watched)
        } else {
            Err(Rejection::Ineligible)
        }
    }

    /// Filter then claim. The returned claim is the run's exclusive hold on the path.
    pub(crate) fn admit(&self, path: &Path) -> Result<Claim, Rejection> {
        let watched = self.inspect(path)?;
        self.registry
            .claim(&watched.path)
            .ok_or(Rejection::InFlight)
    }

    /// Run the pipeline on the current thread. `claim` is released only after the record is
    /// finished and stored, whatever happened inside.
    pub(crate) fn execute(&self, claim: Claim) -> PipelineRecord {
        let record = self.runner.run(claim.path());
        self.history().push(record.clone());
        drop(claim);
        record
    }

    /// Run the pipeline on its own thread.
    pub(crate) fn dispatch(self: &Arc<Self>, claim: Claim) -> JoinHandle<PipelineRecord> {
        let shared = Arc::clone(self);
        thread::spawn(move || shared.execute(claim))
    }

    /// Entry point for every event from the change source. Never fails: rejections are logged.
    pub(crate) fn ingest(self: &Arc<Self>, event: ChangeEvent) {
        match self.admit(&event.path) {
            Ok(claim) => {
                info!(
                    "Data file {:?}: {}",
                    event.origin,
                    claim.path().display()
                );
                // Detached: stop() never cancels runs already dispatched.
                let _ = self.dispatch(claim);
            }
            Err(reason) => debug!("dropped {}: {}", event.path.display(), reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PipelineRecord {
        PipelineRecord::new(id.to_string(), Path::new("/d/a.csv"))
    }

    #[test]
    fn history_evicts_oldest_and_counts_all() {
        let mut h = History::new(2);
        h.push(record("1"));
        h.push(record("2"));
        h.push(record("3"));
        let ids: Vec<_> = h.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(h.total, 3);
    }
}
