//! Load `.datawatch.toml` from a directory. Lib callers build [`Settings`] themselves; the CLI layers this file
//! over the defaults, before the environment and flags.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::config::{PackagePaths, Settings};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DatawatchToml {
    #[serde(default)]
    settings: SettingsSection,
    #[serde(default)]
    hooks: HooksSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    data_directory: Option<String>,
    output_directory: Option<String>,
    extensions: Option<Vec<String>>,
    max_file_size_mb: Option<u64>,
    exclude: Option<Vec<String>>,
    follow_links: Option<bool>,
    bootstrap_interval_ms: Option<u64>,
    history_capacity: Option<usize>,
    branch_prefix: Option<String>,
    commit_prefix: Option<String>,
    remote: Option<String>,
    log_level: Option<String>,
    verbose: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct HooksSection {
    prepare: Option<String>,
    analyze: Option<String>,
    report: Option<String>,
    publish: Option<String>,
    announce: Option<String>,
    timeout_secs: Option<u64>,
}

/// Load the config file from `dir` if present. Missing file → None; malformed file → warn and None.
pub(crate) fn load_datawatch_toml(dir: &Path) -> Option<DatawatchToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_datawatch_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub(crate) fn parse_datawatch_toml(s: &str) -> Result<DatawatchToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite a settings field from the file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $settings:expr, $sec_field:ident => $settings_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $settings.$settings_field = v;
        }
    };
}

/// Apply file values onto `settings` (only fields present in the file).
pub(crate) fn apply_file_to_settings(file: &DatawatchToml, settings: &mut Settings) {
    let s = &file.settings;
    if let Some(ref p) = s.data_directory {
        settings.data_directory = PathBuf::from(p);
    }
    if let Some(ref p) = s.output_directory {
        settings.output_directory = PathBuf::from(p);
    }
    apply_file_opt!(s, settings, extensions => supported_extensions);
    apply_file_opt!(s, settings, max_file_size_mb => max_file_size_mb);
    apply_file_opt!(s, settings, exclude => exclude);
    apply_file_opt!(s, settings, follow_links => follow_links);
    apply_file_opt!(s, settings, history_capacity => history_capacity);
    apply_file_opt!(s, settings, branch_prefix => branch_prefix);
    apply_file_opt!(s, settings, commit_prefix => commit_prefix);
    apply_file_opt!(s, settings, remote => remote);
    apply_file_opt!(s, settings, verbose => verbose);
    if let Some(ms) = s.bootstrap_interval_ms {
        settings.bootstrap_interval = Duration::from_millis(ms);
    }
    if s.log_level.is_some() {
        settings.log_level = s.log_level.clone();
    }

    let h = &file.hooks;
    let hooks = &mut settings.hooks;
    for (src, dst) in [
        (&h.prepare, &mut hooks.prepare),
        (&h.analyze, &mut hooks.analyze),
        (&h.report, &mut hooks.report),
        (&h.publish, &mut hooks.publish),
        (&h.announce, &mut hooks.announce),
    ] {
        if src.is_some() {
            *dst = src.clone();
        }
    }
    if let Some(secs) = h.timeout_secs {
        hooks.timeout = Duration::from_secs(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_only_present_fields() {
        let file = parse_datawatch_toml(
            r#"
            [settings]
            max_file_size_mb = 5
            extensions = [".tsv"]
            bootstrap_interval_ms = 20

            [hooks]
            analyze = "bin/analyze --fast"
            timeout_secs = 9
            "#,
        )
        .unwrap();
        let mut settings = Settings::default();
        apply_file_to_settings(&file, &mut settings);
        assert_eq!(settings.max_file_size_mb, 5);
        assert_eq!(settings.supported_extensions, vec![".tsv".to_string()]);
        assert_eq!(settings.bootstrap_interval, Duration::from_millis(20));
        assert_eq!(settings.hooks.analyze.as_deref(), Some("bin/analyze --fast"));
        assert_eq!(settings.hooks.timeout, Duration::from_secs(9));
        assert_eq!(settings.commit_prefix, "[AUTO]");
        assert!(settings.hooks.publish.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse_datawatch_toml("[settings]\nmax_file_size_mb = \"big\"").is_err());
    }
}
