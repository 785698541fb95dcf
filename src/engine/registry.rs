//! In-flight registry: the set of paths with an active pipeline run.
//!
//! Claim and release are linearizable (single mutex). At most one run is active per path.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    claims: Mutex<HashMap<PathBuf, DateTime<Utc>>>,
    /// Signalled whenever the registry becomes empty.
    idle: Condvar,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, DateTime<Utc>>> {
        // Nothing runs under this lock that can panic halfway through a mutation.
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Test-and-set: insert `path` if absent. `false` means a run is already active for it.
    pub fn try_claim(&self, path: &Path) -> bool {
        let mut claims = self.lock();
        if claims.contains_key(path) {
            return false;
        }
        claims.insert(path.to_path_buf(), Utc::now());
        true
    }

    /// Remove `path`. Idempotent; releasing an unclaimed path is a no-op.
    pub fn release(&self, path: &Path) {
        let mut claims = self.lock();
        if claims.remove(path).is_some() {
            debug!("released {}", path.display());
        }
        if claims.is_empty() {
            self.idle.notify_all();
        }
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    pub fn claimed_at(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.lock().get(path).copied()
    }

    /// Block until nothing is in flight or `timeout` elapses. Returns true when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let claims = self.lock();
        let (claims, _) = self
            .idle
            .wait_timeout_while(claims, timeout, |c| !c.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        claims.is_empty()
    }

    /// Claim `path` and get a guard that releases it when dropped, including during unwinding.
    pub fn claim(self: &Arc<Self>, path: &Path) -> Option<Claim> {
        self.try_claim(path).then(|| Claim {
            registry: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }
}

/// Exclusive hold on one path. Dropping it releases the path.
#[derive(Debug)]
pub struct Claim {
    registry: Arc<InFlightRegistry>,
    path: PathBuf,
}

impl Claim {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.registry.release(&self.path);
    }
}
