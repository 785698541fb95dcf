//! Command-hook collaborators: each pipeline service bound to an external program.
//!
//! Hooks run with a timeout; a timeout, spawn failure or non-zero exit is an ordinary step failure.
//! Hook processes get `DATAWATCH_REMOTE` and `DATAWATCH_OUTPUT_DIR` in their environment.

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::debug;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::pipeline::{Analyzer, Announcer, Publisher, Reporter, Services, WorkspacePreparer};
use crate::utils::config::{HookDefaults, PackagePaths, Settings};
use crate::{AnalysisResult, AnnouncementOutcome, PublicationOutcome, ReportPaths};

/// Captured result of one hook invocation.
#[derive(Debug)]
pub struct HookOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl HookOutput {
    /// Fail with the exit status and the tail of stderr unless the hook exited 0.
    pub fn ensure_success(self, program: &str) -> Result<Self> {
        if self.status.success() {
            return Ok(self);
        }
        bail!(
            "{} exited with {}: {}",
            program,
            self.status,
            stderr_tail(&self.stderr)
        )
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let s = stderr.trim();
    let mut start = s.len().saturating_sub(HookDefaults::STDERR_TAIL);
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// A program plus fixed leading arguments, parsed from a whitespace-separated command line.
#[derive(Clone, Debug)]
pub struct HookCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    env: Vec<(String, OsString)>,
}

impl HookCommand {
    /// `None` for an empty command line.
    pub fn parse(line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            timeout,
            env: Vec::new(),
        })
    }

    pub fn with_env(mut self, key: &str, value: impl Into<OsString>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run with `extra` appended to the fixed arguments, feeding `stdin` if given.
    /// The process is killed when the timeout elapses; output still open at that point is
    /// also a timeout.
    pub fn run<I, S>(&self, extra: I, stdin: Option<Vec<u8>>) -> Result<HookOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let extra: Vec<OsString> = extra.into_iter().map(Into::into).collect();
        debug!("hook: {} {:?} {:?}", self.program, self.args, extra);
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(&extra)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn hook {}", self.program))?;

        if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A hook that ignores stdin closes the pipe early; that is not our failure.
            thread::spawn(move || {
                let _ = pipe.write_all(&bytes);
            });
        }
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_until(&mut child, deadline, self.timeout)
            .with_context(|| format!("hook {}", self.program))?;
        // Background processes started by the hook can keep the pipes open past its exit.
        let stdout = collect(stdout, deadline, self.timeout)
            .with_context(|| format!("hook {} stdout", self.program))?;
        let stderr = collect(stderr, deadline, self.timeout)
            .with_context(|| format!("hook {} stderr", self.program))?;
        Ok(HookOutput {
            status,
            stdout,
            stderr,
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut r| {
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

fn collect(rx: Option<Receiver<String>>, deadline: Instant, timeout: Duration) -> Result<String> {
    let Some(rx) = rx else {
        return Ok(String::new());
    };
    match rx.recv_deadline(deadline) {
        Ok(text) => Ok(text),
        Err(RecvTimeoutError::Disconnected) => Ok(String::new()),
        Err(RecvTimeoutError::Timeout) => Err(anyhow!(
            "timed out after {:?} with output still open",
            timeout
        )),
    }
}

fn wait_until(child: &mut Child, deadline: Instant, timeout: Duration) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out after {:?}", timeout));
        }
        thread::sleep(HookDefaults::POLL);
    }
}

fn path_arg(p: &Path) -> OsString {
    p.as_os_str().to_os_string()
}

// ---- Collaborators ----

pub struct CommandPreparer(pub HookCommand);

impl WorkspacePreparer for CommandPreparer {
    fn prepare(&self, subject: &Path, branch: &str) -> Result<()> {
        self.0
            .run([path_arg(subject), OsString::from(branch)], None)?
            .ensure_success(self.0.program())?;
        Ok(())
    }
}

/// stdout is JSON; empty output or `null` means no usable data.
pub struct CommandAnalyzer(pub HookCommand);

impl Analyzer for CommandAnalyzer {
    fn analyze(&self, subject: &Path) -> Result<Option<AnalysisResult>> {
        let out = self
            .0
            .run([path_arg(subject)], None)?
            .ensure_success(self.0.program())?;
        parse_analysis(&out.stdout)
    }
}

pub fn parse_analysis(stdout: &str) -> Result<Option<AnalysisResult>> {
    let text = stdout.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value =
        serde_json::from_str(text).context("analysis output is not JSON")?;
    Ok(AnalysisResult::from_json(value))
}

/// Analysis JSON on stdin; stdout lines are the primary artifact then auxiliaries.
pub struct CommandReporter(pub HookCommand);

impl Reporter for CommandReporter {
    fn generate_report(
        &self,
        subject: &Path,
        analysis: &AnalysisResult,
    ) -> Result<Option<ReportPaths>> {
        let input = serde_json::to_vec(&analysis.payload).context("serialize analysis")?;
        let out = self
            .0
            .run([path_arg(subject)], Some(input))?
            .ensure_success(self.0.program())?;
        Ok(parse_report_paths(&out.stdout))
    }
}

pub fn parse_report_paths(stdout: &str) -> Option<ReportPaths> {
    let mut lines = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from);
    let primary = lines.next()?;
    Some(ReportPaths {
        primary,
        auxiliary: lines.collect(),
    })
}

/// Exit status is the outcome; trimmed stdout is the locator.
pub struct CommandPublisher(pub HookCommand);

impl Publisher for CommandPublisher {
    fn publish(
        &self,
        branch: &str,
        artifacts: &[PathBuf],
        message: &str,
    ) -> Result<PublicationOutcome> {
        let args = [OsString::from(branch), OsString::from(message)]
            .into_iter()
            .chain(artifacts.iter().map(|p| path_arg(p)));
        let out = self.0.run(args, None)?;
        let locator = Some(out.stdout.trim().to_string()).filter(|s| !s.is_empty());
        if !out.status.success() {
            debug!("publish hook stderr: {}", stderr_tail(&out.stderr));
        }
        Ok(PublicationOutcome {
            success: out.status.success(),
            locator,
        })
    }
}

/// Gets the publication locator as its argument and the analysis JSON on stdin.
pub struct CommandAnnouncer(pub HookCommand);

impl Announcer for CommandAnnouncer {
    fn announce(
        &self,
        publication: &PublicationOutcome,
        analysis: &AnalysisResult,
    ) -> Result<AnnouncementOutcome> {
        let input = serde_json::to_vec(&analysis.payload).context("serialize analysis")?;
        let locator = publication.locator.clone().unwrap_or_default();
        let out = self.0.run([locator], Some(input))?;
        Ok(AnnouncementOutcome {
            success: out.status.success(),
            locator: Some(out.stdout.trim().to_string()).filter(|s| !s.is_empty()),
        })
    }
}

/// Bind configured hooks into a [`Services`] set. Analyze, report and publish are required.
pub fn services_from_settings(settings: &Settings) -> Result<Services> {
    let hooks = &settings.hooks;
    let prefix = PackagePaths::get().env_prefix();
    let output_dir = std::path::absolute(&settings.output_directory)
        .unwrap_or_else(|_| settings.output_directory.clone());
    let bind = |line: &Option<String>| {
        line.as_deref()
            .and_then(|l| HookCommand::parse(l, hooks.timeout))
            .map(|cmd| {
                cmd.with_env(&format!("{prefix}_REMOTE"), &settings.remote)
                    .with_env(&format!("{prefix}_OUTPUT_DIR"), output_dir.as_os_str())
            })
    };
    let missing = |what: &str| {
        anyhow!(
            "no {what} hook configured (set {prefix}_{}_CMD or [hooks].{what})",
            what.to_uppercase()
        )
    };

    let analyzer = bind(&hooks.analyze).ok_or_else(|| missing("analyze"))?;
    let reporter = bind(&hooks.report).ok_or_else(|| missing("report"))?;
    let publisher = bind(&hooks.publish).ok_or_else(|| missing("publish"))?;

    let mut services = Services::new(
        Arc::new(CommandAnalyzer(analyzer)),
        Arc::new(CommandReporter(reporter)),
        Arc::new(CommandPublisher(publisher)),
    );
    if let Some(cmd) = bind(&hooks.prepare) {
        services = services.with_preparer(Arc::new(CommandPreparer(cmd)));
    }
    if let Some(cmd) = bind(&hooks.announce) {
        services = services.with_announcer(Arc::new(CommandAnnouncer(cmd)));
    }
    Ok(services)
}
