//! External collaborators invoked by pipeline steps. The core treats each as opaque.
//!
//! Implementations must be `Send + Sync`: distinct paths run in parallel and share one set of services.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{AnalysisResult, AnnouncementOutcome, PipelineRecord, PublicationOutcome, ReportPaths};

/// Branch / workspace preparation before anything is written.
pub trait WorkspacePreparer: Send + Sync {
    fn prepare(&self, subject: &Path, branch: &str) -> Result<()>;
}

pub trait Analyzer: Send + Sync {
    /// `Ok(None)` signals "no usable data" and halts the run.
    fn analyze(&self, subject: &Path) -> Result<Option<AnalysisResult>>;
}

pub trait Reporter: Send + Sync {
    /// Must cope with an empty analysis result (degraded report rather than failure).
    fn generate_report(&self, subject: &Path, analysis: &AnalysisResult)
    -> Result<Option<ReportPaths>>;
}

pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        branch: &str,
        artifacts: &[PathBuf],
        message: &str,
    ) -> Result<PublicationOutcome>;
}

/// Optional, best-effort announcement (e.g. opening a pull request).
pub trait Announcer: Send + Sync {
    fn announce(
        &self,
        publication: &PublicationOutcome,
        analysis: &AnalysisResult,
    ) -> Result<AnnouncementOutcome>;
}

/// Leaves a human-readable trace of a run. Returns where it was written, if anywhere.
///
/// The record it gets is finished (`finished_at` set) but lacks the summarize step itself.
pub trait SummarySink: Send + Sync {
    fn emit(&self, record: &PipelineRecord) -> Result<Option<PathBuf>>;
}

/// The collaborator set one orchestrator drives. Analyzer, reporter and publisher are mandatory.
#[derive(Clone)]
pub struct Services {
    pub preparer: Option<Arc<dyn WorkspacePreparer>>,
    pub analyzer: Arc<dyn Analyzer>,
    pub reporter: Arc<dyn Reporter>,
    pub publisher: Arc<dyn Publisher>,
    pub announcer: Option<Arc<dyn Announcer>>,
    pub summary: Option<Arc<dyn SummarySink>>,
}

impl Services {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        reporter: Arc<dyn Reporter>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            preparer: None,
            analyzer,
            reporter,
            publisher,
            announcer: None,
            summary: None,
        }
    }

    pub fn with_preparer(mut self, preparer: Arc<dyn WorkspacePreparer>) -> Self {
        self.preparer = Some(preparer);
        self
    }

    pub fn with_announcer(mut self, announcer: Arc<dyn Announcer>) -> Self {
        self.announcer = Some(announcer);
        self
    }

    pub fn with_summary(mut self, summary: Arc<dyn SummarySink>) -> Self {
        self.summary = Some(summary);
        self
    }
}
