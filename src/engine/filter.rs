//! Path eligibility: extension allow-list, size ceiling and exclusions. Pure; callers do the stat.

use std::path::{Path, PathBuf};

use crate::utils::config::Settings;

/// Decides whether a (path, size) pair should be processed.
///
/// Holds no mutable state, so the same input always yields the same answer.
#[derive(Clone, Debug)]
pub struct PathFilter {
    /// Lowercased, each with a leading dot.
    extensions: Vec<String>,
    max_size_bytes: u64,
    excluded_roots: Vec<PathBuf>,
    exclude_patterns: Vec<String>,
}

impl PathFilter {
    pub fn new<I, S>(extensions: I, max_size_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| e.len() > 1)
            .collect();
        Self {
            extensions,
            max_size_bytes,
            excluded_roots: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.supported_extensions, settings.max_file_size_bytes())
            .with_excluded_root(&settings.output_directory)
            .with_exclude_patterns(settings.exclude.iter().cloned())
    }

    /// Never process anything under `root` (e.g. the output directory, so reports don't re-trigger).
    pub fn with_excluded_root(mut self, root: &Path) -> Self {
        let root = root
            .canonicalize()
            .or_else(|_| std::path::absolute(root))
            .unwrap_or_else(|_| root.to_path_buf());
        self.excluded_roots.push(root);
        self
    }

    pub fn with_exclude_patterns<I>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.exclude_patterns.extend(patterns);
        self
    }

    /// True when everything under `root` falls inside an excluded root.
    pub fn excludes_tree(&self, root: &Path) -> bool {
        self.excluded_roots.iter().any(|r| root.starts_with(r))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn should_process(&self, path: &Path, size_bytes: u64) -> bool {
        if size_bytes > self.max_size_bytes {
            return false;
        }
        if !self.has_supported_extension(path) {
            return false;
        }
        if is_os_hidden_file(path) {
            return false;
        }
        if self.excluded_roots.iter().any(|r| path.starts_with(r)) {
            return false;
        }
        !self.matches_exclude_pattern(path)
    }

    /// Case-insensitive suffix match against the allow-list.
    pub fn has_supported_extension(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let name = name.to_ascii_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    fn matches_exclude_pattern(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let full = path.to_str().unwrap_or("");
        self.exclude_patterns
            .iter()
            .any(|p| glob_match(p, name) || glob_match(p, full))
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// OS metadata files that are never data (Finder, Explorer, desktop trash).
pub fn is_os_hidden_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    matches!(
        name,
        ".DS_Store" | ".AppleDouble" | ".LSOverride" | "Thumbs.db" | "ehthumbs.db" | "Desktop.ini"
    ) || name.starts_with("._")
        || name.starts_with(".~lock.")
        || name.starts_with("~$")
}

/// Glob match supporting `*` and `?`. A leading `!` is ignored.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.strip_prefix('!').unwrap_or(pattern).chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Last `*` seen and the text position it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
