//! External-command collaborators, driven through small shell scripts.
#![cfg(unix)]

use datawatch::engine::hooks::{
    CommandAnalyzer, CommandPublisher, CommandReporter, HookCommand, parse_analysis,
};
use datawatch::engine::services_from_settings;
use datawatch::{
    AnalysisResult, Analyzer, PipelineNaming, PipelineRunner, PipelineStatus, Publisher, Reporter,
    Settings, StepName,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

fn script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    format!("sh {}", path.display())
}

fn hook(line: &str) -> HookCommand {
    HookCommand::parse(line, TIMEOUT).unwrap()
}

#[test]
fn test_analyzer_parses_json_stdout() {
    let tmp = tempfile::tempdir().unwrap();
    let line = script(
        tmp.path(),
        "analyze.sh",
        r#"echo "{\"rows\": 4, \"source\": \"$1\", \"generated_files\": [\"/out/a.png\"]}""#,
    );
    let result = CommandAnalyzer(hook(&line))
        .analyze(Path::new("/data/q1.csv"))
        .unwrap()
        .unwrap();
    assert_eq!(result.rows, Some(4));
    assert_eq!(result.payload["source"], "/data/q1.csv");
    assert_eq!(result.generated_files, vec![PathBuf::from("/out/a.png")]);
    assert!(!result.is_empty());
}

#[test]
fn test_analyzer_empty_or_null_output_is_none() {
    let tmp = tempfile::tempdir().unwrap();
    let silent = script(tmp.path(), "silent.sh", "exit 0");
    assert!(
        CommandAnalyzer(hook(&silent))
            .analyze(Path::new("/d/a.csv"))
            .unwrap()
            .is_none()
    );
    assert!(parse_analysis(" null \n").unwrap().is_none());
    assert!(parse_analysis("not json").is_err());
}

#[test]
fn test_analyzer_nonzero_exit_is_error_with_stderr() {
    let tmp = tempfile::tempdir().unwrap();
    let line = script(tmp.path(), "fail.sh", "echo 'bad header row' >&2\nexit 3");
    let err = CommandAnalyzer(hook(&line))
        .analyze(Path::new("/d/a.csv"))
        .unwrap_err();
    assert!(format!("{err:#}").contains("bad header row"), "{err:#}");
}

#[test]
fn test_hook_killed_after_timeout() {
    let cmd = HookCommand::parse("sleep 5", Duration::from_millis(200)).unwrap();
    let started = std::time::Instant::now();
    let err = cmd.run(Vec::<String>::new(), None).unwrap_err();
    assert!(format!("{err:#}").contains("timed out"), "{err:#}");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_background_child_holding_output_times_out() {
    let cmd = HookCommand::parse("sh -c", Duration::from_millis(500)).unwrap();
    let started = std::time::Instant::now();
    let err = cmd.run(["sleep 5 & echo done"], None).unwrap_err();
    assert!(format!("{err:#}").contains("timed out"), "{err:#}");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_missing_program_is_error() {
    let cmd = hook("definitely-not-a-real-program-datawatch");
    assert!(cmd.run(Vec::<String>::new(), None).is_err());
}

#[test]
fn test_reporter_reads_analysis_on_stdin_and_lists_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let seen = tmp.path().join("seen.json");
    let line = script(
        tmp.path(),
        "report.sh",
        &format!(
            "cat > {}\necho /out/reports/full.html\necho\necho /out/reports/report.json",
            seen.display()
        ),
    );
    let analysis = AnalysisResult::from_json(serde_json::json!({ "rows": 2 })).unwrap();
    let report = CommandReporter(hook(&line))
        .generate_report(Path::new("/d/a.csv"), &analysis)
        .unwrap()
        .unwrap();
    assert_eq!(report.primary, PathBuf::from("/out/reports/full.html"));
    assert_eq!(
        report.auxiliary,
        vec![PathBuf::from("/out/reports/report.json")]
    );
    let stdin: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&seen).unwrap()).unwrap();
    assert_eq!(stdin["rows"], 2);
}

#[test]
fn test_reporter_without_output_is_none() {
    let tmp = tempfile::tempdir().unwrap();
    let line = script(tmp.path(), "quiet.sh", "cat > /dev/null");
    let analysis = AnalysisResult::from_json(serde_json::json!({ "rows": 0 })).unwrap();
    assert!(
        CommandReporter(hook(&line))
            .generate_report(Path::new("/d/a.csv"), &analysis)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_publisher_exit_status_is_outcome() {
    let tmp = tempfile::tempdir().unwrap();
    let ok = script(
        tmp.path(),
        "push.sh",
        "echo \"https://example.invalid/tree/$1\"",
    );
    let outcome = CommandPublisher(hook(&ok))
        .publish("analysis-a", &[PathBuf::from("/out/r.html")], "[AUTO] msg")
        .unwrap();
    assert!(outcome.success);
    assert_eq!(
        outcome.locator.as_deref(),
        Some("https://example.invalid/tree/analysis-a")
    );

    let rejected = script(tmp.path(), "reject.sh", "echo 'remote rejected' >&2\nexit 1");
    let outcome = CommandPublisher(hook(&rejected))
        .publish("analysis-a", &[], "[AUTO] msg")
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.locator.is_none());
}

fn hook_settings(tmp: &Path) -> Settings {
    let mut settings = Settings {
        output_directory: tmp.join("out"),
        ..Settings::default()
    };
    settings.hooks.timeout = TIMEOUT;
    settings
}

#[test]
fn test_services_require_core_hooks() {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = hook_settings(tmp.path());
    settings.hooks.analyze = Some(script(tmp.path(), "a.sh", "echo '{}'"));
    settings.hooks.report = Some(script(tmp.path(), "r.sh", "echo /out/r.html"));
    let err = services_from_settings(&settings).err().unwrap();
    assert!(err.to_string().contains("publish"), "{err}");

    settings.hooks.publish = Some(script(tmp.path(), "p.sh", "exit 0"));
    let services = services_from_settings(&settings).unwrap();
    assert!(services.preparer.is_none());
    assert!(services.announcer.is_none());
}

#[test]
fn test_hook_pipeline_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    let log = dir.join("calls.log");
    let mut settings = hook_settings(dir);
    settings.hooks.prepare = Some(script(
        dir,
        "prepare.sh",
        &format!("echo \"prepare $2\" >> {}", log.display()),
    ));
    settings.hooks.analyze = Some(script(
        dir,
        "analyze.sh",
        "echo \"{\\\"rows\\\": 1, \\\"out\\\": \\\"$DATAWATCH_OUTPUT_DIR\\\"}\"",
    ));
    settings.hooks.report = Some(script(
        dir,
        "report.sh",
        "cat > /dev/null\necho \"$DATAWATCH_OUTPUT_DIR/reports/r.html\"",
    ));
    settings.hooks.publish = Some(script(
        dir,
        "publish.sh",
        &format!("echo \"publish $DATAWATCH_REMOTE $1\" >> {}\necho done", log.display()),
    ));
    settings.hooks.announce = Some(script(dir, "announce.sh", "cat > /dev/null\nexit 1"));

    let services = services_from_settings(&settings).unwrap();
    let record = PipelineRunner::new(services, PipelineNaming::from_settings(&settings))
        .run(Path::new("/data/sales.csv"));

    assert_eq!(record.status, PipelineStatus::Succeeded);
    assert_eq!(
        record.step_names(),
        vec![
            StepName::PrepareWorkspace,
            StepName::Analyze,
            StepName::GenerateReport,
            StepName::Publish,
            StepName::Announce,
        ]
    );
    assert!(!record.step(StepName::Announce).unwrap().succeeded);

    let calls = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<_> = calls.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("prepare analysis-pipeline-sales-"));
    assert!(lines[1].starts_with("publish origin analysis-pipeline-sales-"));

    let report = record.step(StepName::GenerateReport).unwrap();
    let expected = std::path::absolute(dir.join("out")).unwrap();
    assert!(
        report
            .detail
            .as_deref()
            .unwrap()
            .starts_with(&expected.display().to_string())
    );
}
