//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use crossbeam_channel::Receiver;
use datawatch::{
    AnalysisResult, Analyzer, AnnouncementOutcome, Announcer, PipelineRecord, PublicationOutcome,
    Publisher, ReportPaths, Reporter, Services, Settings, SummarySink, WorkspacePreparer,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How one fake step behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behavior {
    Ok,
    /// Analyzer: zero-row result. Others: same as Ok.
    Empty,
    /// `Ok(None)` / unsuccessful outcome.
    Null,
    Fail,
    Panic,
}

/// One object playing every collaborator, recording what was called.
pub struct Fake {
    prepare: Option<Behavior>,
    analyze: Behavior,
    report: Behavior,
    publish: Behavior,
    announce: Behavior,
    summary: Behavior,
    calls: Mutex<Vec<&'static str>>,
    analyzed: Mutex<HashMap<PathBuf, usize>>,
    gate: Mutex<Option<Receiver<()>>>,
    active: Mutex<HashMap<PathBuf, usize>>,
    max_active_same_path: AtomicUsize,
    published: Mutex<Vec<Vec<PathBuf>>>,
    analyze_started: Mutex<Vec<Instant>>,
}

impl Default for Fake {
    fn default() -> Self {
        Self {
            prepare: None,
            analyze: Behavior::Ok,
            report: Behavior::Ok,
            publish: Behavior::Ok,
            announce: Behavior::Ok,
            summary: Behavior::Ok,
            calls: Mutex::new(Vec::new()),
            analyzed: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
            active: Mutex::new(HashMap::new()),
            max_active_same_path: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
            analyze_started: Mutex::new(Vec::new()),
        }
    }
}

impl Fake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a preparer; without this call the services carry none.
    pub fn with_prepare(mut self, behavior: Behavior) -> Self {
        self.prepare = Some(behavior);
        self
    }

    pub fn with_analyze(mut self, behavior: Behavior) -> Self {
        self.analyze = behavior;
        self
    }

    pub fn with_report(mut self, behavior: Behavior) -> Self {
        self.report = behavior;
        self
    }

    pub fn with_publish(mut self, behavior: Behavior) -> Self {
        self.publish = behavior;
        self
    }

    pub fn with_announce(mut self, behavior: Behavior) -> Self {
        self.announce = behavior;
        self
    }

    pub fn with_summary(mut self, behavior: Behavior) -> Self {
        self.summary = behavior;
        self
    }

    /// Make every analyze call block until `gate` receives a message or its sender is dropped.
    pub fn gated(self, gate: Receiver<()>) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn analyze_count(&self, path: &Path) -> usize {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.analyzed.lock().unwrap().get(&path).copied().unwrap_or(0)
    }

    pub fn analyzed_paths(&self) -> HashMap<PathBuf, usize> {
        self.analyzed.lock().unwrap().clone()
    }

    pub fn total_analyzed(&self) -> usize {
        self.analyzed.lock().unwrap().values().sum()
    }

    pub fn max_active_same_path(&self) -> usize {
        self.max_active_same_path.load(Ordering::SeqCst)
    }

    /// When each analyze call began, in call order.
    pub fn analyze_started(&self) -> Vec<Instant> {
        self.analyze_started.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<Vec<PathBuf>> {
        self.published.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn act(&self, name: &str, behavior: Behavior) -> Result<()> {
        match behavior {
            Behavior::Fail => Err(anyhow!("{name} exploded")),
            Behavior::Panic => panic!("{name} panicked"),
            _ => Ok(()),
        }
    }

    pub fn services(self: &Arc<Self>) -> Services {
        let mut services = Services::new(self.clone(), self.clone(), self.clone())
            .with_announcer(self.clone())
            .with_summary(self.clone());
        if self.prepare.is_some() {
            services = services.with_preparer(self.clone());
        }
        services
    }
}

impl WorkspacePreparer for Fake {
    fn prepare(&self, _subject: &Path, _branch: &str) -> Result<()> {
        self.record("prepare");
        self.act("prepare", self.prepare.unwrap_or(Behavior::Ok))
    }
}

impl Analyzer for Fake {
    fn analyze(&self, subject: &Path) -> Result<Option<AnalysisResult>> {
        self.record("analyze");
        self.analyze_started.lock().unwrap().push(Instant::now());
        *self
            .analyzed
            .lock()
            .unwrap()
            .entry(subject.to_path_buf())
            .or_default() += 1;
        let now_active = {
            let mut active = self.active.lock().unwrap();
            let n = active.entry(subject.to_path_buf()).or_default();
            *n += 1;
            *n
        };
        self.max_active_same_path
            .fetch_max(now_active, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(rx) = gate {
            let _ = rx.recv();
        }

        *self
            .active
            .lock()
            .unwrap()
            .get_mut(subject)
            .expect("active entry") -= 1;

        self.act("analyze", self.analyze)?;
        Ok(match self.analyze {
            Behavior::Null => None,
            Behavior::Empty => Some(AnalysisResult {
                payload: serde_json::json!({ "rows": 0 }),
                rows: Some(0),
                generated_files: Vec::new(),
            }),
            _ => Some(AnalysisResult {
                payload: serde_json::json!({ "rows": 3, "mean": 1.5 }),
                rows: Some(3),
                generated_files: vec![PathBuf::from("/out/viz/hist.png")],
            }),
        })
    }
}

impl Reporter for Fake {
    fn generate_report(
        &self,
        _subject: &Path,
        analysis: &AnalysisResult,
    ) -> Result<Option<ReportPaths>> {
        self.record("report");
        self.act("report", self.report)?;
        if self.report == Behavior::Null {
            return Ok(None);
        }
        let primary = if analysis.is_empty() {
            "/out/reports/minimal.html"
        } else {
            "/out/reports/full.html"
        };
        Ok(Some(
            ReportPaths::new(primary).with_auxiliary("/out/reports/report.json"),
        ))
    }
}

impl Publisher for Fake {
    fn publish(
        &self,
        _branch: &str,
        artifacts: &[PathBuf],
        _message: &str,
    ) -> Result<PublicationOutcome> {
        self.record("publish");
        self.act("publish", self.publish)?;
        self.published.lock().unwrap().push(artifacts.to_vec());
        Ok(PublicationOutcome {
            success: self.publish != Behavior::Null,
            locator: Some("https://example.invalid/branch".to_string()),
        })
    }
}

impl Announcer for Fake {
    fn announce(
        &self,
        _publication: &PublicationOutcome,
        _analysis: &AnalysisResult,
    ) -> Result<AnnouncementOutcome> {
        self.record("announce");
        self.act("announce", self.announce)?;
        Ok(AnnouncementOutcome {
            success: self.announce != Behavior::Null,
            locator: Some("https://example.invalid/pr/1".to_string()),
        })
    }
}

impl SummarySink for Fake {
    fn emit(&self, _record: &PipelineRecord) -> Result<Option<PathBuf>> {
        self.record("summary");
        self.act("summary", self.summary)?;
        Ok(None)
    }
}

/// Settings pointing at scratch directories with a short bootstrap interval.
pub fn test_settings(data: &Path, output: &Path) -> Settings {
    Settings {
        data_directory: data.to_path_buf(),
        output_directory: output.to_path_buf(),
        bootstrap_interval: Duration::from_millis(10),
        ..Settings::default()
    }
}

pub fn write_file(path: &Path, contents: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
    path.canonicalize().unwrap()
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn eventually<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
