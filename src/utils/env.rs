//! Environment layer: load `.env` (dotenvy), then apply recognised variables onto [`Settings`].
//! Variables already set in the process win over values in `.env`.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::utils::config::{PackagePaths, Settings};

/// Load `.env` from `dir` if present. Missing file is fine; a malformed one is logged.
pub fn load_dotenv(dir: &Path) {
    let env_path = dir.join(".env");
    if !env_path.is_file() {
        return;
    }
    match dotenvy::from_path(&env_path) {
        Ok(()) => debug!("loaded {}", env_path.display()),
        Err(e) => warn!("{}: {}", env_path.display(), e),
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("{}={:?} is not valid; keeping previous value", key, raw);
            None
        }
    }
}

/// Apply variables read through `lookup` (usually `std::env::var`). Unknown or empty values are ignored.
pub fn apply_env_to_settings<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| non_empty(lookup(key));
    let prefix = PackagePaths::get().env_prefix();

    if let Some(v) = get("DATA_DIRECTORY") {
        settings.data_directory = PathBuf::from(v);
    }
    if let Some(v) = get("OUTPUT_DIRECTORY") {
        settings.output_directory = PathBuf::from(v);
    }
    if let Some(v) = get("MAX_FILE_SIZE_MB")
        && let Some(mb) = parse_or_warn::<u64>("MAX_FILE_SIZE_MB", &v)
    {
        settings.max_file_size_mb = mb;
    }
    if let Some(v) = get("LOG_LEVEL") {
        settings.log_level = Some(v);
    }
    if let Some(v) = get("GIT_BRANCH") {
        settings.branch_prefix = v;
    }
    if let Some(v) = get("COMMIT_PREFIX") {
        settings.commit_prefix = v;
    }
    if let Some(v) = get("GIT_REMOTE") {
        settings.remote = v;
    }

    let hooks = &mut settings.hooks;
    for (name, slot) in [
        ("PREPARE", &mut hooks.prepare),
        ("ANALYZE", &mut hooks.analyze),
        ("REPORT", &mut hooks.report),
        ("PUBLISH", &mut hooks.publish),
        ("ANNOUNCE", &mut hooks.announce),
    ] {
        if let Some(v) = get(&format!("{prefix}_{name}_CMD")) {
            *slot = Some(v);
        }
    }
    let timeout_key = format!("{prefix}_HOOK_TIMEOUT_SECS");
    if let Some(v) = get(&timeout_key)
        && let Some(secs) = parse_or_warn::<u64>(&timeout_key, &v)
    {
        hooks.timeout = Duration::from_secs(secs);
    }
}
