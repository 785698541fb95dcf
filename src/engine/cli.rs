//! CLI command handler: watch by default; --analyze runs one file and exits.

use anyhow::{Context, Result, bail};
use crossbeam_channel::bounded;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::PipelineStatus;
use crate::engine::arg_parser::Cli;
use crate::engine::hooks::services_from_settings;
use crate::engine::summary::JsonSummarySink;
use crate::pipeline::Orchestrator;
use crate::utils::config::{Settings, WatchDefaults};
use crate::utils::datawatch_toml::{apply_file_to_settings, load_datawatch_toml};
use crate::utils::{apply_env_to_settings, load_dotenv, setup_logging};

/// Layer CLI flags over `settings` (flags win).
pub fn apply_cli_to_settings(cli: &Cli, settings: &mut Settings) {
    if let Some(ref d) = cli.dir {
        settings.data_directory = d.clone();
    }
    if let Some(ref o) = cli.output {
        settings.output_directory = o.clone();
    }
    if let Some(mb) = cli.max_size_mb {
        settings.max_file_size_mb = mb;
    }
    if !cli.exclude.is_empty() {
        settings.exclude.extend(cli.exclude.iter().cloned());
    }
    if let Some(f) = cli.follow_links {
        settings.follow_links = f;
    }
    if let Some(ms) = cli.bootstrap_interval_ms {
        settings.bootstrap_interval = Duration::from_millis(ms);
    }
    if let Some(v) = cli.verbose {
        settings.verbose = v;
    }
}

/// Defaults → `.datawatch.toml` → environment (after `.env`) → flags.
pub fn resolve_settings(cli: &Cli, cwd: &Path) -> Settings {
    let mut settings = Settings::default();
    if let Some(file) = load_datawatch_toml(cwd) {
        apply_file_to_settings(&file, &mut settings);
    }
    load_dotenv(cwd);
    apply_env_to_settings(&mut settings, |k| std::env::var(k).ok());
    apply_cli_to_settings(cli, &mut settings);
    settings
}

fn build_orchestrator(settings: &Settings) -> Result<Orchestrator> {
    let services = services_from_settings(settings)?
        .with_summary(Arc::new(JsonSummarySink::new(settings.summary_directory())));
    std::fs::create_dir_all(&settings.output_directory).with_context(|| {
        format!(
            "create output directory {}",
            settings.output_directory.display()
        )
    })?;
    Ok(Orchestrator::new(settings, services))
}

/// Watch (default) or run once with --analyze.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("read current directory")?;
    let settings = resolve_settings(cli, &cwd);
    setup_logging(settings.verbose, settings.log_level.as_deref());
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), settings);

    let orchestrator = build_orchestrator(&settings)?;
    match cli.analyze {
        Some(ref file) => analyze_once(&orchestrator, file),
        None => watch_until_interrupted(&orchestrator, &settings),
    }
}

fn analyze_once(orchestrator: &Orchestrator, file: &Path) -> Result<()> {
    let record = match orchestrator.run_now(file) {
        Ok(r) => r,
        Err(reason) => bail!("{} not analyzed: {}", file.display(), reason),
    };
    match record.status {
        PipelineStatus::Failed => bail!(
            "pipeline {} failed: {}",
            record.id,
            record.termination_reason.unwrap_or_default()
        ),
        _ => {
            info!("One-time analysis completed ({})", record.id);
            Ok(())
        }
    }
}

fn watch_until_interrupted(orchestrator: &Orchestrator, settings: &Settings) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("set Ctrl+C handler")?;

    orchestrator.start(&settings.data_directory)?;
    info!("Pipeline is now monitoring for data changes...");
    info!("Output directory: {}", settings.output_directory.display());

    let _ = shutdown_rx.recv();
    info!("Received shutdown signal");
    orchestrator.stop();

    let status = orchestrator.status();
    if status.in_flight > 0 {
        info!(
            "Waiting up to {:?} for {} run(s) to finish",
            WatchDefaults::SHUTDOWN_GRACE,
            status.in_flight
        );
        if !orchestrator.wait_idle(WatchDefaults::SHUTDOWN_GRACE) {
            warn!(
                "Exiting with {} run(s) still in flight",
                orchestrator.status().in_flight
            );
        }
    }
    info!(
        "Pipeline stopped after {} run(s)",
        orchestrator.status().total_pipelines
    );
    Ok(())
}
