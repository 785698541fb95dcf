//! Application configuration: defaults and the explicit [`Settings`] value handed to the orchestrator.
//! Tuning and thresholds in one place.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived file and directory names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    /// `.datawatch.toml`, looked up in the working directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Prefix for crate-specific environment variables (`DATAWATCH_*`).
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Subdirectory of the output directory that receives run summaries.
    pub fn summary_dir_name(&self) -> &'static str {
        "pipeline_logs"
    }
}

// ---- Watching ----

pub struct WatchDefaults;

impl WatchDefaults {
    pub const DATA_DIRECTORY: &'static str = "./data";
    pub const OUTPUT_DIRECTORY: &'static str = "./output";
    pub const SUPPORTED_EXTENSIONS: [&'static str; 4] = [".csv", ".json", ".xlsx", ".parquet"];
    pub const MAX_FILE_SIZE_MB: u64 = 100;
    /// Gap between bootstrap dispatches; small next to a typical run.
    pub const BOOTSTRAP_INTERVAL: Duration = Duration::from_millis(100);
    /// Finished runs kept in memory.
    pub const HISTORY_CAPACITY: usize = 50;
    /// How long the CLI waits for in-flight runs after Ctrl+C.
    pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
}

pub const BYTES_PER_MB: u64 = 1024 * 1024;

// ---- Publication naming ----

pub struct GitDefaults;

impl GitDefaults {
    pub const BRANCH_PREFIX: &'static str = "analysis-pipeline";
    pub const COMMIT_PREFIX: &'static str = "[AUTO]";
    pub const REMOTE: &'static str = "origin";
}

// ---- Hooks ----

pub struct HookDefaults;

impl HookDefaults {
    pub const TIMEOUT: Duration = Duration::from_secs(300);
    /// Poll interval while waiting on a hook process.
    pub const POLL: Duration = Duration::from_millis(25);
    /// Bytes of stderr kept in a failure cause.
    pub const STDERR_TAIL: usize = 400;
}

/// External commands bound to each collaborator. Analyze, report and publish are required to watch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookSettings {
    pub prepare: Option<String>,
    pub analyze: Option<String>,
    pub report: Option<String>,
    pub publish: Option<String>,
    pub announce: Option<String>,
    pub timeout: Duration,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            prepare: None,
            analyze: None,
            report: None,
            publish: None,
            announce: None,
            timeout: HookDefaults::TIMEOUT,
        }
    }
}

/// Everything the orchestrator and CLI need, resolved once at start-up.
#[derive(Clone, Debug)]
pub struct Settings {
    pub data_directory: PathBuf,
    pub output_directory: PathBuf,
    pub supported_extensions: Vec<String>,
    pub max_file_size_mb: u64,
    /// Glob patterns never processed (matched on file name and full path).
    pub exclude: Vec<String>,
    pub follow_links: bool,
    pub bootstrap_interval: Duration,
    pub history_capacity: usize,
    pub branch_prefix: String,
    pub commit_prefix: String,
    pub remote: String,
    /// `error`..`trace`; `None` means info (or debug with --verbose).
    pub log_level: Option<String>,
    pub verbose: bool,
    pub hooks: HookSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from(WatchDefaults::DATA_DIRECTORY),
            output_directory: PathBuf::from(WatchDefaults::OUTPUT_DIRECTORY),
            supported_extensions: WatchDefaults::SUPPORTED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size_mb: WatchDefaults::MAX_FILE_SIZE_MB,
            exclude: Vec::new(),
            follow_links: false,
            bootstrap_interval: WatchDefaults::BOOTSTRAP_INTERVAL,
            history_capacity: WatchDefaults::HISTORY_CAPACITY,
            branch_prefix: GitDefaults::BRANCH_PREFIX.to_string(),
            commit_prefix: GitDefaults::COMMIT_PREFIX.to_string(),
            remote: GitDefaults::REMOTE.to_string(),
            log_level: None,
            verbose: false,
            hooks: HookSettings::default(),
        }
    }
}

impl Settings {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn summary_directory(&self) -> PathBuf {
        self.output_directory
            .join(PackagePaths::get().summary_dir_name())
    }
}
