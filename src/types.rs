//! Public types for the watch → pipeline core: change events, run records and collaborator payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a change notification came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Delivered by the directory watcher as the tree changes.
    LiveEvent,
    /// Produced once at start-up for files already present.
    BootstrapScan,
}

/// One path notification handed from the change source to the orchestrator.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub origin: Origin,
}

impl ChangeEvent {
    pub fn live(path: PathBuf) -> Self {
        Self {
            path,
            origin: Origin::LiveEvent,
        }
    }

    pub fn bootstrap(path: PathBuf) -> Self {
        Self {
            path,
            origin: Origin::BootstrapScan,
        }
    }
}

/// Absolute file path plus the size observed right before filtering. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedPath {
    pub path: PathBuf,
    pub size: u64,
}

/// Why a path was not turned into a pipeline run. Not an error: callers log and move on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Path does not exist, is not a regular file, or could not be stat'ed.
    Missing,
    /// Extension not allowed, too large, or excluded.
    Ineligible,
    /// A run for this path is already active.
    InFlight,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::Missing => "missing or unreadable",
            Rejection::Ineligible => "not eligible (type, size or exclusion)",
            Rejection::InFlight => "already in flight",
        };
        f.write_str(s)
    }
}

// ---- Pipeline records ----

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Running,
    Succeeded,
    Failed,
}

/// The fixed stages of one run, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    PrepareWorkspace,
    Analyze,
    GenerateReport,
    Publish,
    Announce,
    Summarize,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::PrepareWorkspace => "prepare_workspace",
            StepName::Analyze => "analyze",
            StepName::GenerateReport => "generate_report",
            StepName::Publish => "publish",
            StepName::Announce => "announce",
            StepName::Summarize => "summarize",
        }
    }

    /// Best-effort steps record their failure but never change the run's status.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, StepName::Announce | StepName::Summarize)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit entry for one stage of a run.
#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    pub name: StepName,
    pub succeeded: bool,
    pub duration_micros: u64,
    pub started_at: DateTime<Utc>,
    /// Branch name, artifact paths, locator, or the failure cause.
    pub detail: Option<String>,
}

/// Full audit trail of one triggered run, from detection to terminal state.
///
/// `steps` is append-only and only the pipeline runner appends to it. After a mandatory step
/// fails the status is `Failed` and nothing else is appended.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineRecord {
    pub id: String,
    pub subject_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: PipelineStatus,
    steps: Vec<StepRecord>,
    pub termination_reason: Option<String>,
}

impl PipelineRecord {
    pub(crate) fn new(id: String, subject_path: &Path) -> Self {
        Self {
            id,
            subject_path: subject_path.to_path_buf(),
            started_at: Utc::now(),
            finished_at: None,
            status: PipelineStatus::Running,
            steps: Vec::new(),
            termination_reason: None,
        }
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn step(&self, name: StepName) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_names(&self) -> Vec<StepName> {
        self.steps.iter().map(|s| s.name).collect()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Wall-clock duration of the run, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// Append a finalized step. A failed mandatory step flips the run to `Failed` on the spot.
    pub(crate) fn append(&mut self, step: StepRecord) {
        debug_assert!(
            self.status != PipelineStatus::Failed,
            "step appended after the run failed"
        );
        if !step.succeeded && !step.name.is_best_effort() {
            self.status = PipelineStatus::Failed;
            self.termination_reason = step.detail.clone();
        }
        self.steps.push(step);
    }

    pub(crate) fn mark_succeeded(&mut self) {
        if self.status == PipelineStatus::Running {
            self.status = PipelineStatus::Succeeded;
        }
    }

    pub(crate) fn finish(&mut self) {
        self.mark_succeeded();
        self.finished_at = Some(Utc::now());
    }
}

// ---- Collaborator payloads ----

/// Output of the analysis collaborator. The core only looks at emptiness and the list of
/// generated files; everything else is carried through to the report collaborator untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub payload: serde_json::Value,
    /// Visualizations or other files written during analysis, published with the report.
    #[serde(default)]
    pub generated_files: Vec<PathBuf>,
    /// Row count when the analyzer knows it.
    #[serde(default)]
    pub rows: Option<u64>,
}

impl AnalysisResult {
    /// Build from an analyzer's JSON output. `null` means "no usable data".
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let generated_files = value
            .get("generated_files")
            .and_then(|v| v.as_array())
            .map(|files| {
                files
                    .iter()
                    .filter_map(|f| f.as_str())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();
        let rows = value.get("rows").and_then(|v| v.as_u64());
        Some(Self {
            payload: value,
            generated_files,
            rows,
        })
    }

    /// True for a zero-size result (e.g. an empty dataset). Such results still get reported.
    pub fn is_empty(&self) -> bool {
        if self.rows == Some(0) {
            return true;
        }
        match &self.payload {
            serde_json::Value::Null => true,
            serde_json::Value::Object(m) => m.is_empty(),
            serde_json::Value::Array(a) => a.is_empty(),
            serde_json::Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// Artifacts written by the report collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPaths {
    pub primary: PathBuf,
    #[serde(default)]
    pub auxiliary: Vec<PathBuf>,
}

impl ReportPaths {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            auxiliary: Vec::new(),
        }
    }

    pub fn with_auxiliary(mut self, path: impl Into<PathBuf>) -> Self {
        self.auxiliary.push(path.into());
        self
    }

    /// Primary first, then auxiliaries in the order they were produced.
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.primary).chain(self.auxiliary.iter())
    }
}

/// Result of publishing artifacts. `locator` is opaque (e.g. a remote URL).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublicationOutcome {
    pub success: bool,
    pub locator: Option<String>,
}

/// Result of the optional announcement (e.g. a pull request).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnnouncementOutcome {
    pub success: bool,
    pub locator: Option<String>,
}
