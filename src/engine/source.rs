//! Live change source: a recursive `notify` watch whose callbacks are forwarded as
//! [`ChangeEvent`]s over a channel. Only file create/modify events are emitted.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::ChangeEvent;

/// Keeps the OS watch alive. Dropping it (or calling [`ChangeSource::close`]) ends delivery.
pub struct ChangeSource {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl ChangeSource {
    /// Establish a recursive watch on `root` and forward live events to `tx`.
    ///
    /// Events arrive on the watcher's own thread and are sent with no added delay.
    pub fn watch(root: &Path, tx: Sender<ChangeEvent>) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in live_paths(event) {
                    // Receiver gone means we are shutting down.
                    if tx.send(ChangeEvent::live(path)).is_err() {
                        break;
                    }
                }
            }
            Err(e) => warn!("watch error: {}", e),
        })
        .context("create file watcher")?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watch {}", root.display()))?;
        info!("Watching {}", root.display());
        Ok(Self {
            watcher,
            root: root.to_path_buf(),
        })
    }

    /// Tear down the watch explicitly (dropping does the same, silently).
    pub fn close(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            debug!("unwatch {}: {}", self.root.display(), e);
        }
        info!("Stopped watching {}", self.root.display());
    }
}

/// Paths worth forwarding from one notify event: creations and modifications of non-directories.
pub fn live_paths(event: Event) -> Vec<PathBuf> {
    let wanted = match event.kind {
        EventKind::Create(CreateKind::Folder) => false,
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    if !wanted {
        return Vec::new();
    }
    event.paths.into_iter().filter(|p| !p.is_dir()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn forwards_file_create_and_data_modify() {
        let created = live_paths(event(EventKind::Create(CreateKind::File), "/nope/a.csv"));
        assert_eq!(created, vec![PathBuf::from("/nope/a.csv")]);
        let modified = live_paths(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/nope/b.csv",
        ));
        assert_eq!(modified.len(), 1);
    }

    #[test]
    fn drops_folders_removals_and_access() {
        assert!(live_paths(event(EventKind::Create(CreateKind::Folder), "/nope/d")).is_empty());
        assert!(live_paths(event(EventKind::Remove(RemoveKind::File), "/nope/a.csv")).is_empty());
        assert!(live_paths(event(EventKind::Access(AccessKind::Any), "/nope/a.csv")).is_empty());
    }
}
