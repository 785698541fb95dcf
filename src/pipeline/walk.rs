//! Bootstrap scan: walk the watched tree once at start-up and pace pre-existing files into
//! the event channel through the [`Debouncer`].

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::ChangeEvent;

/// One result from a directory walk: a file to consider or an error with optional path.
pub enum WalkOutcome {
    Ok(PathBuf),
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a walkdir result into [`WalkOutcome`]. Directories and other non-files are dropped.
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> Option<WalkOutcome> {
    match r {
        Ok(entry) if entry.file_type().is_file() => Some(WalkOutcome::Ok(entry.into_path())),
        Ok(_) => None,
        Err(err) => Some(WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        }),
    }
}

/// Files under `root` that `eligible` accepts, in walk order. Walk errors are logged and skipped.
pub fn scan_existing<F>(root: &Path, follow_links: bool, eligible: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut found = Vec::new();
    let mut skipped = 0_usize;
    let iter = walkdir::WalkDir::new(root)
        .follow_links(follow_links)
        .into_iter()
        .filter_map(to_outcome_walkdir);
    for outcome in iter {
        match outcome {
            WalkOutcome::Ok(path) => {
                if eligible(&path) {
                    found.push(path);
                }
            }
            WalkOutcome::Err { msg, path } => {
                skipped += 1;
                match path {
                    Some(p) => debug!("scan skipped {}: {}", p.display(), msg),
                    None => debug!("scan error: {}", msg),
                }
            }
        }
    }
    if skipped > 0 {
        warn!(
            "Skipped {} paths during start-up scan due to permission errors or access issues",
            skipped
        );
    }
    found
}

/// Spaces out bootstrap dispatches so a large backlog does not launch every run at once.
///
/// Pacing only: duplicate runs are prevented by the in-flight registry, not here.
#[derive(Clone, Copy, Debug)]
pub struct Debouncer {
    interval: Duration,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait `interval` before each dispatch. Stops early when `stop` fires or disconnects,
    /// or when `dispatch` returns false. Returns how many paths were dispatched.
    pub fn pace<I, F>(&self, paths: I, stop: &Receiver<()>, mut dispatch: F) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
        F: FnMut(PathBuf) -> bool,
    {
        let mut sent = 0_usize;
        for path in paths {
            match stop.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("pacing interrupted after {} dispatches", sent);
                    break;
                }
            }
            if !dispatch(path) {
                break;
            }
            sent += 1;
        }
        sent
    }
}

/// Spawn the one-time scan: list eligible files under `root`, then pace them into `tx`.
/// The thread returns the number of paths dispatched.
pub fn spawn_bootstrap_scan<F>(
    root: PathBuf,
    follow_links: bool,
    debouncer: Debouncer,
    tx: Sender<ChangeEvent>,
    stop: Receiver<()>,
    eligible: F,
) -> JoinHandle<usize>
where
    F: Fn(&Path) -> bool + Send + 'static,
{
    thread::spawn(move || {
        info!("Scanning for existing data files...");
        let existing = scan_existing(&root, follow_links, eligible);
        if existing.is_empty() {
            info!("No existing data files found");
            return 0;
        }
        info!(
            "Found {} existing data files; dispatching every {:?}",
            existing.len(),
            debouncer.interval()
        );
        let sent = debouncer.pace(existing, &stop, |path| {
            tx.send(ChangeEvent::bootstrap(path)).is_ok()
        });
        info!("Dispatched {} existing files", sent);
        sent
    })
}
