use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::context::{OrchestratorStatus, Shared};
use super::runner::{PipelineNaming, PipelineRunner};
use super::services::Services;
use super::walk::{Debouncer, spawn_bootstrap_scan};
use crate::engine::filter::PathFilter;
use crate::engine::source::ChangeSource;
use crate::utils::config::Settings;
use crate::{ChangeEvent, PipelineRecord, Rejection};

/// Everything that exists only while watching.
struct Watching {
    root: PathBuf,
    source: ChangeSource,
    /// Dropped on stop; both background threads see the disconnect.
    stop_tx: Sender<()>,
    intake: JoinHandle<()>,
    scan: JoinHandle<usize>,
}

/// Owns the watch lifecycle and wires change source → filter → in-flight registry → runner.
///
/// Per-file failures never reach the caller; only `start` can fail, and only for the watch itself.
pub struct Orchestrator {
    shared: Arc<Shared>,
    debouncer: Debouncer,
    follow_links: bool,
    state: Mutex<Option<Watching>>,
}

impl Orchestrator {
    pub fn new(settings: &Settings, services: Services) -> Self {
        let runner = PipelineRunner::new(services, PipelineNaming::from_settings(settings));
        Self::with_filter(settings, PathFilter::from_settings(settings), runner)
    }

    /// Build with an explicit filter and runner (e.g. a filter without the output-dir exclusion).
    pub fn with_filter(settings: &Settings, filter: PathFilter, runner: PipelineRunner) -> Self {
        Self {
            shared: Arc::new(Shared::new(filter, runner, settings.history_capacity)),
            debouncer: Debouncer::new(settings.bootstrap_interval),
            follow_links: settings.follow_links,
            state: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<Watching>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `dir` if needed, establish the watch, start intake and the one-time bootstrap scan.
    ///
    /// Idempotent: a second call while running is a no-op. Errors only when the directory cannot
    /// be created or watched; the orchestrator then stays stopped.
    pub fn start(&self, dir: &Path) -> Result<()> {
        let mut state = self.state();
        if let Some(w) = state.as_ref() {
            if w.root != dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()) {
                warn!(
                    "Already watching {}; ignoring start for {}",
                    w.root.display(),
                    dir.display()
                );
            } else {
                debug!("start: already watching {}", w.root.display());
            }
            return Ok(());
        }

        std::fs::create_dir_all(dir)
            .with_context(|| format!("create watch directory {}", dir.display()))?;
        let root = dir
            .canonicalize()
            .with_context(|| format!("canonicalize {}", dir.display()))?;
        info!("Starting data monitor on {}", root.display());
        if self.shared.filter.excludes_tree(&root) {
            warn!(
                "{} is inside an excluded directory (e.g. the output directory); no file under it will be processed",
                root.display()
            );
        }

        let (event_tx, event_rx) = unbounded::<ChangeEvent>();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let source = ChangeSource::watch(&root, event_tx.clone())?;

        let intake = spawn_intake(Arc::clone(&self.shared), event_rx, stop_rx.clone());
        let scan_shared = Arc::clone(&self.shared);
        let scan = spawn_bootstrap_scan(
            root.clone(),
            self.follow_links,
            self.debouncer,
            event_tx,
            stop_rx,
            move |p| scan_shared.inspect(p).is_ok(),
        );

        info!(
            "Monitoring file types: {}",
            self.shared.filter.extensions().join(", ")
        );
        *state = Some(Watching {
            root,
            source,
            stop_tx,
            intake,
            scan,
        });
        Ok(())
    }

    /// Stop accepting events. Runs already dispatched continue to completion.
    /// Safe before `start` and safe to repeat.
    pub fn stop(&self) {
        let Some(w) = self.state().take() else {
            debug!("stop: not running");
            return;
        };
        info!("Stopping data monitor...");
        w.source.close();
        drop(w.stop_tx);
        if w.intake.join().is_err() {
            error!("intake thread panicked");
        }
        match w.scan.join() {
            Ok(n) => debug!("bootstrap scan dispatched {} paths", n),
            Err(_) => error!("bootstrap scan thread panicked"),
        }
        let in_flight = self.shared.registry.size();
        if in_flight > 0 {
            info!("Data monitor stopped; {} run(s) still finishing", in_flight);
        } else {
            info!("Data monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_some()
    }

    pub fn status(&self) -> OrchestratorStatus {
        let watch_directory = self.state().as_ref().map(|w| w.root.clone());
        OrchestratorStatus {
            running: watch_directory.is_some(),
            watch_directory,
            in_flight: self.shared.registry.size(),
            total_pipelines: self.shared.total_pipelines(),
            supported_extensions: self.shared.filter.extensions().to_vec(),
            max_file_size_bytes: self.shared.filter.max_size_bytes(),
        }
    }

    /// Manually start a run for `path`, bypassing the watch but not the filter or the registry.
    /// Join the handle to get the finished record.
    pub fn trigger(&self, path: &Path) -> Result<JoinHandle<PipelineRecord>, Rejection> {
        let claim = self.shared.admit(path)?;
        info!("Manually triggering analysis for {}", claim.path().display());
        Ok(self.shared.dispatch(claim))
    }

    /// Like [`trigger`](Self::trigger) but runs on the calling thread.
    pub fn run_now(&self, path: &Path) -> Result<PipelineRecord, Rejection> {
        let claim = self.shared.admit(path)?;
        info!("Running one-time analysis on {}", claim.path().display());
        Ok(self.shared.execute(claim))
    }

    pub fn is_in_flight(&self, path: &Path) -> bool {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.shared.registry.contains(&path)
    }

    /// Finished runs, oldest first (bounded by the configured history capacity).
    pub fn history(&self) -> Vec<PipelineRecord> {
        self.shared.history_snapshot()
    }

    /// Block until no run is in flight or `timeout` elapses. Returns true when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.registry.wait_idle(timeout)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single consumer of the event channel. Claims happen here, one event at a time.
fn spawn_intake(
    shared: Arc<Shared>,
    events: Receiver<ChangeEvent>,
    stop: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => shared.ingest(event),
                    Err(_) => break,
                },
                recv(stop) -> _ => break,
            }
        }
        debug!("intake loop exited");
    })
}
