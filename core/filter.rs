//! Per-entry include/exclude decisions.
//!
//! Evaluation order, first match wins:
//! output file, symlinks and special files, excluded directory names,
//! the gitignore cascade, then the file rules in [`FileRule::ORDER`].

use crate::error::{AppError, Result};
use crate::gitignore::{CascadeMatch, MatcherStack};
use crate::rules::{PROJECT_META_NAMES, RuleSet, file_extension};
use crate::size::human_size;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use log;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Include,
    ExcludeEntry,
    /// Directories only: the walk must not descend.
    ExcludeSubtree,
}

impl Decision {
    pub fn is_included(self) -> bool {
        self == Decision::Include
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Fifos, sockets, device nodes.
    Other,
}

/// What the engine needs to know about an entry, taken without following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub kind: EntryKind,
    pub size: u64,
    /// Unix permission bits; always 0 on other platforms.
    pub mode: u32,
}

impl EntryMeta {
    /// Expects metadata from `symlink_metadata` (or walkdir without link following).
    pub fn from_metadata(meta: &fs::Metadata) -> Self {
        let ft = meta.file_type();
        let kind = if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Self {
            kind,
            size: meta.len(),
            mode: permission_bits(meta),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

#[cfg(test)]
impl EntryMeta {
    pub fn file(size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            size,
            mode: 0o644,
        }
    }

    pub fn dir() -> Self {
        Self {
            kind: EntryKind::Dir,
            size: 0,
            mode: 0o755,
        }
    }

    pub fn symlink() -> Self {
        Self {
            kind: EntryKind::Symlink,
            size: 0,
            mode: 0o777,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(unix)]
fn permission_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn permission_bits(_meta: &fs::Metadata) -> u32 {
    0
}

/// File-level rules, checked in [`FileRule::ORDER`] once an entry is known
/// to be a regular file that survived the gitignore cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRule {
    MaxSize,
    UserExtension,
    UserPattern,
    Executable,
    Media,
    Archive,
    Lockfile,
    Miscellaneous,
    Auxiliary,
}

impl FileRule {
    pub const ORDER: [FileRule; 9] = [
        FileRule::MaxSize,
        FileRule::UserExtension,
        FileRule::UserPattern,
        FileRule::Executable,
        FileRule::Media,
        FileRule::Archive,
        FileRule::Lockfile,
        FileRule::Miscellaneous,
        FileRule::Auxiliary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FileRule::MaxSize => "max size",
            FileRule::UserExtension => "user extension",
            FileRule::UserPattern => "user pattern",
            FileRule::Executable => "executable",
            FileRule::Media => "media",
            FileRule::Archive => "archive",
            FileRule::Lockfile => "lockfile",
            FileRule::Miscellaneous => "miscellaneous",
            FileRule::Auxiliary => "auxiliary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason {
    OutputFile,
    Symlink,
    SpecialFile,
    DirectoryName,
    Gitignore { level: usize },
    Rule { rule: FileRule },
    Accepted,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::OutputFile => write!(f, "output file"),
            Reason::Symlink => write!(f, "symlink"),
            Reason::SpecialFile => write!(f, "special file"),
            Reason::DirectoryName => write!(f, "excluded directory name"),
            Reason::Gitignore { level } => write!(f, "gitignore (level {})", level),
            Reason::Rule { rule } => write!(f, "{} rule", rule.name()),
            Reason::Accepted => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: Reason,
}

impl Verdict {
    fn new(decision: Decision, reason: Reason) -> Self {
        Self { decision, reason }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// 0 disables the size check.
    pub max_file_size: u64,
    pub skip_aux_files: bool,
    /// Absolute, canonical path of the artifact being written.
    pub output_file: Option<PathBuf>,
}

/// The decision engine. Immutable after construction.
#[derive(Debug, Clone)]
pub struct FileFilter {
    root: PathBuf,
    options: FilterOptions,
    dir_names: HashSet<String>,
    user_extensions: HashSet<String>,
    user_globs: GlobSet,
    executable_extensions: HashSet<String>,
    media_extensions: HashSet<String>,
    archive_extensions: HashSet<String>,
    lockfile_names: HashSet<String>,
    lockfile_globs: GlobSet,
    misc_extensions: HashSet<String>,
    misc_names: HashSet<String>,
    aux_extensions: HashSet<String>,
    aux_names: HashSet<String>,
    aux_prefixes: Vec<String>,
    aux_globs: GlobSet,
}

impl FileFilter {
    /// Fails only on an invalid glob in the user or built-in lists.
    pub fn new(root: &Path, rules: &RuleSet, options: FilterOptions) -> Result<Self> {
        let dir_names = rules
            .exclude_dirs
            .iter()
            .chain(rules.user_exclude_dirs.iter())
            .cloned()
            .collect();

        let (lockfile_names, lockfile_patterns) = split_literal_names(&rules.lockfile_patterns);
        let (aux_literals, aux_patterns) = split_literal_names(&rules.aux_names);

        let aux_names: HashSet<String> = aux_literals.iter().map(|n| n.to_lowercase()).collect();
        let aux_prefixes = PROJECT_META_NAMES
            .iter()
            .map(|n| n.to_lowercase())
            .filter(|n| aux_names.contains(n))
            .collect();

        let filter = Self {
            root: root.to_path_buf(),
            options,
            dir_names,
            user_extensions: to_set(&rules.user_extensions),
            user_globs: build_glob_set(&rules.user_patterns)?,
            executable_extensions: to_set(&rules.executable_extensions),
            media_extensions: to_set(&rules.media_extensions),
            archive_extensions: to_set(&rules.archive_extensions),
            lockfile_names,
            lockfile_globs: build_glob_set(&lockfile_patterns)?,
            misc_extensions: to_set(&rules.misc_extensions),
            misc_names: to_set(&rules.misc_names),
            aux_extensions: to_set(&rules.aux_extensions),
            aux_names,
            aux_prefixes,
            aux_globs: build_glob_set(&aux_patterns)?,
        };
        log::debug!(
            "Decision engine ready (root: {}, max size: {}, skip aux: {})",
            filter.root.display(),
            filter.options.max_file_size,
            filter.options.skip_aux_files
        );
        Ok(filter)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Forward-slash path relative to the traversal root.
    pub fn relative_path(&self, abs_path: &Path) -> String {
        relative_slash_path(&self.root, abs_path)
    }

    pub fn decide(&self, abs_path: &Path, meta: &EntryMeta, stack: &MatcherStack) -> Decision {
        self.explain(abs_path, meta, stack).decision
    }

    /// Stats the entry (without following links) and decides.
    pub fn decide_path(&self, abs_path: &Path, stack: &MatcherStack) -> Result<Decision> {
        let meta = fs::symlink_metadata(abs_path).map_err(|e| AppError::Metadata {
            path: abs_path.to_path_buf(),
            source: e,
        })?;
        Ok(self.decide(abs_path, &EntryMeta::from_metadata(&meta), stack))
    }

    pub fn explain(&self, abs_path: &Path, meta: &EntryMeta, stack: &MatcherStack) -> Verdict {
        if self.options.output_file.as_deref() == Some(abs_path) {
            log::debug!("Skipping output file itself: {}", abs_path.display());
            return Verdict::new(Decision::ExcludeEntry, Reason::OutputFile);
        }

        match meta.kind {
            EntryKind::Symlink => {
                log::debug!("Skipping symlink: {}", abs_path.display());
                return Verdict::new(Decision::ExcludeEntry, Reason::Symlink);
            }
            EntryKind::Other => {
                log::debug!("Skipping special file: {}", abs_path.display());
                return Verdict::new(Decision::ExcludeEntry, Reason::SpecialFile);
            }
            EntryKind::File | EntryKind::Dir => {}
        }

        let is_dir = meta.is_dir();
        let name = abs_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if is_dir && self.dir_names.contains(&name) {
            log::trace!("Skipping excluded directory name: {}", abs_path.display());
            return Verdict::new(Decision::ExcludeSubtree, Reason::DirectoryName);
        }

        if let CascadeMatch::Ignored { level } = stack.cascade(abs_path, is_dir) {
            log::trace!("Gitignored (level {}): {}", level, abs_path.display());
            let decision = if is_dir {
                Decision::ExcludeSubtree
            } else {
                Decision::ExcludeEntry
            };
            return Verdict::new(decision, Reason::Gitignore { level });
        }

        if is_dir {
            return Verdict::new(Decision::Include, Reason::Accepted);
        }

        let ext = file_extension(&name);
        let rel = self.relative_path(abs_path);
        for rule in FileRule::ORDER {
            if self.rule_matches(rule, &name, &rel, ext.as_deref(), meta) {
                if rule == FileRule::MaxSize {
                    log::info!(
                        "Skipping large file ({} > {}): {}",
                        human_size(meta.size),
                        human_size(self.options.max_file_size),
                        rel
                    );
                } else {
                    log::trace!("Excluded by {} rule: {}", rule.name(), rel);
                }
                return Verdict::new(Decision::ExcludeEntry, Reason::Rule { rule });
            }
        }

        Verdict::new(Decision::Include, Reason::Accepted)
    }

    fn rule_matches(
        &self,
        rule: FileRule,
        name: &str,
        rel: &str,
        ext: Option<&str>,
        meta: &EntryMeta,
    ) -> bool {
        let ext_in = |set: &HashSet<String>| ext.is_some_and(|e| set.contains(e));
        match rule {
            FileRule::MaxSize => {
                self.options.max_file_size > 0 && meta.size > self.options.max_file_size
            }
            FileRule::UserExtension => ext_in(&self.user_extensions),
            FileRule::UserPattern => {
                self.user_globs.is_match(rel) || self.user_globs.is_match(name)
            }
            FileRule::Executable => {
                meta.mode & 0o111 != 0 || ext_in(&self.executable_extensions)
            }
            FileRule::Media => ext_in(&self.media_extensions),
            FileRule::Archive => ext_in(&self.archive_extensions),
            FileRule::Lockfile => {
                self.lockfile_names.contains(name) || self.lockfile_globs.is_match(name)
            }
            FileRule::Miscellaneous => {
                ext_in(&self.misc_extensions) || self.misc_names.contains(name)
            }
            FileRule::Auxiliary => self.options.skip_aux_files && self.is_auxiliary(name, ext),
        }
    }

    fn is_auxiliary(&self, name: &str, ext: Option<&str>) -> bool {
        if ext.is_some_and(|e| self.aux_extensions.contains(e)) {
            return true;
        }
        let lower = name.to_lowercase();
        self.aux_names.contains(&lower)
            || self.aux_prefixes.iter().any(|p| lower.starts_with(p.as_str()))
            || self.aux_globs.is_match(name)
    }
}

pub fn relative_slash_path(root: &Path, abs_path: &Path) -> String {
    let rel = pathdiff::diff_paths(abs_path, root).unwrap_or_else(|| abs_path.to_path_buf());
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn split_literal_names(patterns: &[String]) -> (HashSet<String>, Vec<String>) {
    let mut literals = HashSet::new();
    let mut globs = Vec::new();
    for p in patterns {
        if is_glob(p) {
            globs.push(p.clone());
        } else {
            literals.insert(p.clone());
        }
    }
    (literals, globs)
}

fn to_set(items: &[String]) -> HashSet<String> {
    items.iter().cloned().collect()
}

/// `*` never crosses `/`. A trailing `/` matches everything below that directory.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern_str in patterns {
        let mut processed_pattern = pattern_str.trim().to_string();
        if processed_pattern.is_empty() {
            continue;
        }
        if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
            processed_pattern.push_str("**");
        }
        let glob = GlobBuilder::new(&processed_pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                log::error!("Invalid glob pattern \"{}\": {}", pattern_str, e);
                AppError::Glob(format!(
                    "Invalid glob pattern \"{}\" (processed as \"{}\"): {}",
                    pattern_str, processed_pattern, e
                ))
            })?;
        log::trace!(
            "Adding glob pattern: {} (processed as {})",
            pattern_str,
            processed_pattern
        );
        builder.add(glob);
    }
    builder.build().map_err(|e| {
        log::error!("Error building glob set: {}", e);
        AppError::Glob(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitignore::IgnoreCache;
    use tempfile::TempDir;

    const ROOT: &str = "/project";

    fn filter_with(rules: RuleSet, options: FilterOptions) -> FileFilter {
        FileFilter::new(Path::new(ROOT), &rules, options).unwrap()
    }

    fn builtin_filter() -> FileFilter {
        filter_with(RuleSet::builtin().unwrap(), FilterOptions::default())
    }

    fn decide_file(filter: &FileFilter, rel: &str, meta: EntryMeta) -> Verdict {
        filter.explain(&Path::new(ROOT).join(rel), &meta, &MatcherStack::new())
    }

    #[test]
    fn output_file_wins_over_everything() {
        let filter = filter_with(
            RuleSet::empty(),
            FilterOptions {
                output_file: Some(PathBuf::from("/project/out.txt")),
                ..Default::default()
            },
        );
        let v = decide_file(&filter, "out.txt", EntryMeta::file(10));
        assert_eq!(v.decision, Decision::ExcludeEntry);
        assert_eq!(v.reason, Reason::OutputFile);
        assert!(decide_file(&filter, "other.txt", EntryMeta::file(10)).decision.is_included());
    }

    #[test]
    fn symlinks_are_always_excluded() {
        let filter = filter_with(RuleSet::empty(), FilterOptions::default());
        let v = decide_file(&filter, "link", EntryMeta::symlink());
        assert_eq!(v, Verdict::new(Decision::ExcludeEntry, Reason::Symlink));
    }

    #[test]
    fn excluded_directory_name_skips_subtree_but_not_same_named_file() {
        let filter = builtin_filter();
        assert_eq!(
            decide_file(&filter, "node_modules", EntryMeta::dir()).decision,
            Decision::ExcludeSubtree
        );
        assert_eq!(
            decide_file(&filter, "a/b/target", EntryMeta::dir()).decision,
            Decision::ExcludeSubtree
        );
        assert!(decide_file(&filter, "src", EntryMeta::dir()).decision.is_included());
        assert!(decide_file(&filter, "build", EntryMeta::file(1)).decision.is_included());
    }

    #[test]
    fn size_law() {
        let filter = filter_with(
            RuleSet::empty(),
            FilterOptions {
                max_file_size: 100,
                ..Default::default()
            },
        );
        assert!(decide_file(&filter, "a.rs", EntryMeta::file(100)).decision.is_included());
        let v = decide_file(&filter, "a.rs", EntryMeta::file(101));
        assert_eq!(v.reason, Reason::Rule { rule: FileRule::MaxSize });

        let unlimited = filter_with(RuleSet::empty(), FilterOptions::default());
        assert!(
            decide_file(&unlimited, "a.rs", EntryMeta::file(u64::MAX))
                .decision
                .is_included()
        );
    }

    #[test]
    fn user_extensions_and_patterns() {
        let rules = RuleSet::empty().with_user_overrides(
            &[],
            &["PROTO".to_string()],
            &["*.min.js".to_string(), "generated/".to_string(), "docs/*.md".to_string()],
        );
        let filter = filter_with(rules, FilterOptions::default());

        let rule_of = |rel: &str| decide_file(&filter, rel, EntryMeta::file(1)).reason;
        assert_eq!(rule_of("api/v1.Proto"), Reason::Rule { rule: FileRule::UserExtension });
        assert_eq!(rule_of("web/app.min.js"), Reason::Rule { rule: FileRule::UserPattern });
        assert_eq!(rule_of("generated/x/y.rs"), Reason::Rule { rule: FileRule::UserPattern });
        assert_eq!(rule_of("docs/intro.md"), Reason::Rule { rule: FileRule::UserPattern });
        assert_eq!(rule_of("docs/deep/intro.md"), Reason::Accepted);
        assert_eq!(rule_of("web/app.js"), Reason::Accepted);
    }

    #[test]
    fn invalid_user_glob_is_fatal() {
        let rules = RuleSet::empty().with_user_overrides(&[], &[], &["src/[".to_string()]);
        let err = FileFilter::new(Path::new(ROOT), &rules, FilterOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Glob(_)));
    }

    #[test]
    fn builtin_categories_in_order() {
        let filter = builtin_filter();
        let reason = |rel: &str, meta: EntryMeta| decide_file(&filter, rel, meta).reason;

        assert_eq!(
            reason("run.sh", EntryMeta::file(1).with_mode(0o755)),
            Reason::Rule { rule: FileRule::Executable }
        );
        assert_eq!(
            reason("tool.EXE", EntryMeta::file(1)),
            Reason::Rule { rule: FileRule::Executable }
        );
        assert_eq!(reason("logo.png", EntryMeta::file(1)), Reason::Rule { rule: FileRule::Media });
        assert_eq!(
            reason("bundle.tar.gz", EntryMeta::file(1)),
            Reason::Rule { rule: FileRule::Archive }
        );
        assert_eq!(
            reason("Cargo.lock", EntryMeta::file(1)),
            Reason::Rule { rule: FileRule::Lockfile }
        );
        assert_eq!(
            reason("app.gradle.lockfile", EntryMeta::file(1)),
            Reason::Rule { rule: FileRule::Lockfile }
        );
        assert_eq!(
            reason("debug.log", EntryMeta::file(1)),
            Reason::Rule { rule: FileRule::Miscellaneous }
        );
        assert_eq!(
            reason("LICENSE", EntryMeta::file(1)),
            Reason::Rule { rule: FileRule::Miscellaneous }
        );
        assert_eq!(reason("src/main.rs", EntryMeta::file(1)), Reason::Accepted);
        assert_eq!(reason(".gitignore", EntryMeta::file(1)), Reason::Accepted);
    }

    #[test]
    fn auxiliary_files_only_when_requested() {
        let rules = RuleSet::builtin().unwrap();
        let keep = filter_with(rules.clone(), FilterOptions::default());
        let skip = filter_with(
            rules,
            FilterOptions {
                skip_aux_files: true,
                ..Default::default()
            },
        );
        for rel in ["README.md", "config.yaml", "notes.txt", "readme", "LICENSE-MIT"] {
            assert!(
                decide_file(&keep, rel, EntryMeta::file(1)).decision.is_included(),
                "{} should be kept without the aux flag",
                rel
            );
            assert_eq!(
                decide_file(&skip, rel, EntryMeta::file(1)).reason,
                Reason::Rule { rule: FileRule::Auxiliary },
                "{} should be auxiliary",
                rel
            );
        }
        assert!(decide_file(&skip, "src/lib.rs", EntryMeta::file(1)).decision.is_included());
    }

    #[test]
    fn tooling_dotfiles_are_miscellaneous_but_gitignore_is_kept() {
        let filter = builtin_filter();
        for rel in [
            ".dockerignore",
            ".npmignore",
            ".eslintignore",
            ".prettierignore",
            ".editorconfig",
            ".prettierrc",
            ".stylelintrc",
            ".eslintrc",
            ".babelrc",
        ] {
            assert_eq!(
                decide_file(&filter, rel, EntryMeta::file(1)).reason,
                Reason::Rule { rule: FileRule::Miscellaneous },
                "{} should be excluded by default",
                rel
            );
        }
        assert!(decide_file(&filter, ".gitignore", EntryMeta::file(1)).decision.is_included());
        assert!(decide_file(&filter, "web/.babelrc.js", EntryMeta::file(1)).decision.is_included());
    }

    #[test]
    fn gitignore_match_excludes_subtree_for_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(".gitignore"), "build-out/\n*.bak\n").unwrap();
        let mut cache = IgnoreCache::new();
        let stack = MatcherStack::new().extended(cache.compile(root));
        let filter = FileFilter::new(root, &RuleSet::empty(), FilterOptions::default()).unwrap();

        assert_eq!(
            filter.decide(&root.join("build-out"), &EntryMeta::dir(), &stack),
            Decision::ExcludeSubtree
        );
        assert_eq!(
            filter.decide(&root.join("x.bak"), &EntryMeta::file(3), &stack),
            Decision::ExcludeEntry
        );
        assert_eq!(
            filter.decide(&root.join("x.rs"), &EntryMeta::file(3), &stack),
            Decision::Include
        );
    }

    #[test]
    fn decide_path_reports_missing_entries() {
        let tmp = TempDir::new().unwrap();
        let filter =
            FileFilter::new(tmp.path(), &RuleSet::empty(), FilterOptions::default()).unwrap();
        let err = filter
            .decide_path(&tmp.path().join("gone.txt"), &MatcherStack::new())
            .unwrap_err();
        assert!(matches!(err, AppError::Metadata { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn decide_path_excludes_broken_symlink() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        std::os::unix::fs::symlink(tmp.path().join("nowhere"), &link).unwrap();
        let filter =
            FileFilter::new(tmp.path(), &RuleSet::empty(), FilterOptions::default()).unwrap();
        assert_eq!(
            filter.decide_path(&link, &MatcherStack::new()).unwrap(),
            Decision::ExcludeEntry
        );
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        assert_eq!(
            relative_slash_path(Path::new("/a"), Path::new("/a/b/c.txt")),
            "b/c.txt"
        );
    }
}
