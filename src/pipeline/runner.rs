//! Pipeline runner: executes the fixed step sequence for one path and records the outcome.
//!
//! prepare (optional) → analyze → report → publish → announce (best-effort) → summarize (best-effort).
//! Each step's record is finalized before the next starts. A failed mandatory step ends the run;
//! nothing already done is rolled back.

use anyhow::anyhow;
use chrono::{DateTime, Local, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::error_handler::run_delegate;
use super::services::Services;
use crate::utils::config::Settings;
use crate::{AnalysisResult, PipelineRecord, PipelineStatus, ReportPaths, StepName, StepRecord};

/// Naming for branches, commit messages and run ids.
#[derive(Clone, Debug)]
pub struct PipelineNaming {
    pub branch_prefix: String,
    pub commit_prefix: String,
}

impl Default for PipelineNaming {
    fn default() -> Self {
        Self {
            branch_prefix: crate::utils::config::GitDefaults::BRANCH_PREFIX.to_string(),
            commit_prefix: crate::utils::config::GitDefaults::COMMIT_PREFIX.to_string(),
        }
    }
}

impl PipelineNaming {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            branch_prefix: settings.branch_prefix.clone(),
            commit_prefix: settings.commit_prefix.clone(),
        }
    }

    /// `<prefix>-<file stem>-<YYYYmmdd_HHMMSS>`: unique across concurrent runs on different files.
    pub fn branch_for(&self, subject: &Path, at: DateTime<Local>) -> String {
        let stem = subject
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string());
        let stem: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "{}-{}-{}",
            self.branch_prefix,
            stem,
            at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn commit_message(&self, subject: &Path) -> String {
        let name = subject
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{} Analysis results for {}", self.commit_prefix, name)
    }
}

pub struct PipelineRunner {
    services: Services,
    naming: PipelineNaming,
    seq: AtomicU64,
}

impl PipelineRunner {
    pub fn new(services: Services, naming: PipelineNaming) -> Self {
        Self {
            services,
            naming,
            seq: AtomicU64::new(0),
        }
    }

    /// Time-based id with a sequence suffix so runs started in the same microsecond differ.
    fn next_id(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let now = Local::now();
        format!(
            "pipeline_{}_{:06}_{}",
            now.format("%Y%m%d_%H%M%S"),
            now.timestamp_subsec_micros(),
            seq
        )
    }

    /// Run every step for `subject` and return the finished record. Never panics on delegate failure.
    pub fn run(&self, subject: &Path) -> PipelineRecord {
        let mut run = Run::new(PipelineRecord::new(self.next_id(), subject));
        info!("Pipeline {} started for {}", run.record.id, subject.display());
        self.drive(&mut run, subject);
        run.into_record()
    }

    fn drive(&self, run: &mut Run, subject: &Path) {
        let services = &self.services;
        let branch = self.naming.branch_for(subject, Local::now());

        if let Some(preparer) = &services.preparer {
            let prepared = run.step(StepName::PrepareWorkspace, || {
                preparer.prepare(subject, &branch)?;
                Ok(((), Some(branch.clone())))
            });
            if prepared.is_none() {
                return;
            }
        }

        let Some(analysis) = run.step(StepName::Analyze, || {
            let analysis = services
                .analyzer
                .analyze(subject)?
                .ok_or_else(|| anyhow!("analysis produced no usable data"))?;
            let detail = if analysis.is_empty() {
                warn!(
                    "Empty analysis for {}; continuing with a degraded report",
                    subject.display()
                );
                Some("empty result; degraded report".to_string())
            } else {
                analysis.rows.map(|r| format!("{r} rows"))
            };
            Ok((analysis, detail))
        }) else {
            return;
        };

        let Some(report) = run.step(StepName::GenerateReport, || {
            let report = services
                .reporter
                .generate_report(subject, &analysis)?
                .ok_or_else(|| anyhow!("report generation produced no artifacts"))?;
            let detail = join_paths(report.all());
            Ok((report, Some(detail)))
        }) else {
            return;
        };

        let artifacts = publication_payload(&report, &analysis);
        let message = self.naming.commit_message(subject);
        let Some(publication) = run.step(StepName::Publish, || {
            let outcome = services.publisher.publish(&branch, &artifacts, &message)?;
            if !outcome.success {
                return Err(anyhow!(
                    "publication reported failure{}",
                    outcome
                        .locator
                        .as_deref()
                        .map(|l| format!(" ({l})"))
                        .unwrap_or_default()
                ));
            }
            let detail = format!(
                "{} artifact(s) on {}{}",
                artifacts.len(),
                branch,
                outcome
                    .locator
                    .as_deref()
                    .map(|l| format!(" -> {l}"))
                    .unwrap_or_default()
            );
            Ok((outcome, Some(detail)))
        }) else {
            return;
        };

        // Artifacts are durably published from here on; what follows cannot fail the run.
        run.record.mark_succeeded();

        if let Some(announcer) = &services.announcer {
            run.step(StepName::Announce, || {
                let outcome = announcer.announce(&publication, &analysis)?;
                if !outcome.success {
                    return Err(anyhow!("announcement reported failure"));
                }
                Ok(((), outcome.locator))
            });
        }

        if let Some(sink) = &services.summary {
            // Everything but the summarize step itself; the run is over apart from this write.
            let mut snapshot = run.record.clone();
            snapshot.finished_at = Some(Utc::now());
            run.step(StepName::Summarize, || {
                let written = sink.emit(&snapshot)?;
                Ok(((), written.map(|p| p.display().to_string())))
            });
        }
    }
}

/// Report artifacts first, then analysis outputs, without duplicates.
fn publication_payload(report: &ReportPaths, analysis: &AnalysisResult) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for p in report.all().chain(analysis.generated_files.iter()) {
        if !out.contains(p) {
            out.push(p.clone());
        }
    }
    out
}

fn join_paths<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> String {
    paths
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A record being built. Only this type appends steps.
struct Run {
    record: PipelineRecord,
}

impl Run {
    fn new(record: PipelineRecord) -> Self {
        Self { record }
    }

    /// Execute one step delegate and append its record. Returns the delegate's value on success.
    ///
    /// On failure of a mandatory step the record becomes `Failed` with this step's cause.
    fn step<T, F>(&mut self, name: StepName, f: F) -> Option<T>
    where
        F: FnOnce() -> anyhow::Result<(T, Option<String>)>,
    {
        debug_assert_ne!(self.record.status, PipelineStatus::Failed);
        let started_at: DateTime<Utc> = Utc::now();
        let t0 = Instant::now();
        debug!("{}: step {} started", self.record.id, name);
        let outcome = run_delegate(f);
        let duration_micros = t0.elapsed().as_micros() as u64;
        match outcome {
            Ok((value, detail)) => {
                debug!(
                    "{}: step {} ok in {}us",
                    self.record.id, name, duration_micros
                );
                self.record.append(StepRecord {
                    name,
                    succeeded: true,
                    duration_micros,
                    started_at,
                    detail,
                });
                Some(value)
            }
            Err(cause) => {
                if name.is_best_effort() {
                    warn!("{}: {} failed (best-effort): {}", self.record.id, name, cause);
                } else {
                    warn!("{}: {} failed: {}", self.record.id, name, cause);
                }
                self.record.append(StepRecord {
                    name,
                    succeeded: false,
                    duration_micros,
                    started_at,
                    detail: Some(cause),
                });
                None
            }
        }
    }

    fn into_record(mut self) -> PipelineRecord {
        self.record.finish();
        let secs = self
            .record
            .duration()
            .and_then(|d| d.to_std().ok())
            .unwrap_or_default()
            .as_secs_f64();
        match self.record.status {
            PipelineStatus::Failed => warn!(
                "Pipeline {} failed in {:.2}s: {}",
                self.record.id,
                secs,
                self.record
                    .termination_reason
                    .as_deref()
                    .unwrap_or("unknown cause")
            ),
            _ => info!(
                "Pipeline {} completed successfully in {:.2}s ({} steps)",
                self.record.id,
                secs,
                self.record.steps().len()
            ),
        }
        self.record
    }
}
