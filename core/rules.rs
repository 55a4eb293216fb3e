use crate::error::Result;
use log;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Names matched case-insensitively by prefix when auxiliary files are skipped,
/// so `LICENSE-MIT` or `README.md` fall in the same bucket as the bare name.
pub const PROJECT_META_NAMES: &[&str] = &[
    "LICENSE",
    "README",
    "NOTICE",
    "AUTHORS",
    "CHANGELOG",
    "CONTRIBUTING",
    "MANIFEST",
    "COPYING",
];

/// Every static list the decision engine consults, plus the user overrides.
///
/// Pure data: no I/O happens here beyond parsing the embedded defaults.
/// Extension lists are kept normalized (`.ext`, lower case) once they pass
/// through [`RuleSet::normalized`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSet {
    pub exclude_dirs: Vec<String>,
    pub media_extensions: Vec<String>,
    pub archive_extensions: Vec<String>,
    pub executable_extensions: Vec<String>,
    pub lockfile_patterns: Vec<String>,
    pub misc_extensions: Vec<String>,
    pub misc_names: Vec<String>,
    pub aux_extensions: Vec<String>,
    pub aux_names: Vec<String>,
    pub user_exclude_dirs: Vec<String>,
    pub user_extensions: Vec<String>,
    pub user_patterns: Vec<String>,
}

const DEFAULT_EXCLUSIONS_YAML: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../data/default_exclusions.yaml"
));

static BUILTIN_RULES: OnceCell<RuleSet> = OnceCell::new();

impl RuleSet {
    /// The embedded default lists, normalized.
    pub fn builtin() -> Result<Self> {
        BUILTIN_RULES
            .get_or_try_init(|| Self::from_yaml(DEFAULT_EXCLUSIONS_YAML))
            .cloned()
    }

    /// Parses a rule list document in the embedded defaults' format.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RuleSet = serde_yml::from_str(yaml)?;
        Ok(rules.normalized())
    }

    /// No default lists at all. Only user overrides (if added) apply.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.media_extensions,
            &mut self.archive_extensions,
            &mut self.executable_extensions,
            &mut self.misc_extensions,
            &mut self.aux_extensions,
            &mut self.user_extensions,
        ] {
            normalize_extension_list(list);
        }
        for list in [
            &mut self.exclude_dirs,
            &mut self.lockfile_patterns,
            &mut self.misc_names,
            &mut self.aux_names,
            &mut self.user_exclude_dirs,
            &mut self.user_patterns,
        ] {
            trim_list(list);
        }
        self
    }

    /// Appends user supplied lists. Extensions are normalized, directory names
    /// lose any trailing slash.
    pub fn with_user_overrides(
        mut self,
        dirs: &[String],
        extensions: &[String],
        patterns: &[String],
    ) -> Self {
        self.user_exclude_dirs.extend(
            dirs.iter()
                .map(|d| d.trim().trim_end_matches(['/', '\\']).to_string()),
        );
        self.user_extensions.extend(extensions.iter().cloned());
        self.user_patterns.extend(patterns.iter().cloned());
        log::trace!(
            "User overrides: dirs={:?} exts={:?} patterns={:?}",
            dirs,
            extensions,
            patterns
        );
        self.normalized()
    }

    #[cfg(test)]
    pub fn is_excluded_dir_name(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
            || self.user_exclude_dirs.iter().any(|d| d == name)
    }
}

/// Lower-cases an extension and gives it exactly one leading dot.
/// `"MD"`, `".md"` and `" .Md "` all become `".md"`. Idempotent.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Extension of a file name in normalized form. Dotfiles such as
/// `.gitignore` have none.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
}

fn normalize_extension_list(list: &mut Vec<String>) {
    let mut out: Vec<String> = Vec::with_capacity(list.len());
    for item in list.drain(..) {
        let ext = normalize_extension(&item);
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    *list = out;
}

fn trim_list(list: &mut Vec<String>) {
    list.retain(|s| !s.trim().is_empty());
    for item in list.iter_mut() {
        let t = item.trim();
        if t.len() != item.len() {
            *item = t.to_string();
        }
    }
}
