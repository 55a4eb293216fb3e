use crate::error::{AppError, Result};
use crate::filter::{Decision, EntryMeta, FileFilter, Verdict};
use crate::gitignore::{IgnoreCache, MatcherStack};
use log;
use serde::Serialize;
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An accepted file, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatheredFile {
    #[serde(skip)]
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub size: u64,
}

/// Directories first, then case-insensitive name, raw name as tie-break.
pub fn compare_entries(
    a_is_dir: bool,
    a_name: &OsStr,
    b_is_dir: bool,
    b_name: &OsStr,
) -> Ordering {
    b_is_dir.cmp(&a_is_dir).then_with(|| {
        let a_lower = a_name.to_string_lossy().to_lowercase();
        let b_lower = b_name.to_string_lossy().to_lowercase();
        a_lower.cmp(&b_lower).then_with(|| a_name.cmp(b_name))
    })
}

/// Every entry the walk reached, with the verdict that was applied to it.
/// Children of excluded directories are not listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedEntry {
    pub rel_path: String,
    pub is_dir: bool,
    pub size: u64,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// Walks the filter's root depth-first and returns every accepted file.
///
/// Only a failure at the root aborts. Anything below it is logged and skipped.
pub fn gather_files(filter: &FileFilter, cache: &mut IgnoreCache) -> Result<Vec<GatheredFile>> {
    let mut files = Vec::new();
    walk_entries(filter, cache, |path, meta, verdict| {
        if verdict.decision.is_included() && !meta.is_dir() {
            let rel_path = filter.relative_path(path);
            log::debug!("Including file: {}", rel_path);
            files.push(GatheredFile {
                abs_path: path.to_path_buf(),
                rel_path,
                size: meta.size,
            });
        }
    })?;
    log::info!(
        "Walk complete: {} files accepted, {} gitignore files loaded.",
        files.len(),
        cache.loads()
    );
    Ok(files)
}

/// Same walk as [`gather_files`], keeping excluded entries and their reasons.
pub fn explain_entries(
    filter: &FileFilter,
    cache: &mut IgnoreCache,
) -> Result<Vec<ExplainedEntry>> {
    let mut entries = Vec::new();
    walk_entries(filter, cache, |path, meta, verdict| {
        entries.push(ExplainedEntry {
            rel_path: filter.relative_path(path),
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.size },
            verdict: *verdict,
        });
    })?;
    Ok(entries)
}

fn walk_entries<F>(filter: &FileFilter, cache: &mut IgnoreCache, mut visit: F) -> Result<()>
where
    F: FnMut(&Path, &EntryMeta, &Verdict),
{
    let root = filter.root().to_path_buf();
    log::info!("Walking directory: {}", root.display());

    fs::read_dir(&root).map_err(|e| AppError::FileRead {
        path: root.clone(),
        source: e,
    })?;

    // stacks[d] is the matcher stack of the open directory at depth d.
    let mut stacks: Vec<MatcherStack> = vec![MatcherStack::new().extended(cache.compile(&root))];

    let mut walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by(|a, b| {
            compare_entries(
                a.file_type().is_dir(),
                a.file_name(),
                b.file_type().is_dir(),
                b.file_name(),
            )
        })
        .into_iter();

    while let Some(entry_result) = walker.next() {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    return Err(AppError::from(e));
                }
                log::warn!("Error walking directory (entry skipped): {}", e);
                continue;
            }
        };

        let depth = entry.depth();
        if depth == 0 {
            continue;
        }
        stacks.truncate(depth);
        let path = entry.path();

        let md = match entry.metadata() {
            Ok(md) => md,
            Err(e) => {
                log::warn!("Cannot read metadata for '{}' (skipped): {}", path.display(), e);
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }
        };
        let meta = EntryMeta::from_metadata(&md);
        let parent_stack = &stacks[depth - 1];
        let verdict = filter.explain(path, &meta, parent_stack);
        visit(path, &meta, &verdict);

        match verdict.decision {
            Decision::Include => {
                if meta.is_dir() {
                    let next = parent_stack.extended(cache.compile(path));
                    stacks.push(next);
                }
            }
            Decision::ExcludeSubtree | Decision::ExcludeEntry => {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOptions;
    use crate::filter::Reason;
    use crate::rules::RuleSet;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    fn gather(root: &Path, rules: RuleSet) -> Vec<String> {
        let root = root.canonicalize().unwrap();
        let filter = FileFilter::new(&root, &rules, FilterOptions::default()).unwrap();
        let mut cache = IgnoreCache::new();
        gather_files(&filter, &mut cache)
            .unwrap()
            .into_iter()
            .map(|f| f.rel_path)
            .collect()
    }

    #[test]
    fn ordering_puts_dirs_first_then_case_insensitive() {
        let mut names = vec![
            (false, "b.txt"),
            (true, "Zeta"),
            (false, "A.txt"),
            (true, "alpha"),
        ];
        names.sort_by(|a, b| compare_entries(a.0, OsStr::new(a.1), b.0, OsStr::new(b.1)));
        let sorted: Vec<&str> = names.iter().map(|n| n.1).collect();
        assert_eq!(sorted, vec!["alpha", "Zeta", "A.txt", "b.txt"]);
    }

    #[test]
    fn files_come_back_in_tree_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "z.rs", "z");
        write(tmp.path(), "B.rs", "b");
        write(tmp.path(), "src/main.rs", "fn main() {}");
        write(tmp.path(), "src/lib/mod.rs", "");
        write(tmp.path(), "a.rs", "a");

        assert_eq!(
            gather(tmp.path(), RuleSet::empty()),
            vec!["src/lib/mod.rs", "src/main.rs", "a.rs", "B.rs", "z.rs"]
        );
    }

    #[test]
    fn excluded_subtree_is_never_entered() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "node_modules/pkg/index.js", "x");
        write(tmp.path(), "app.js", "x");
        let rules = RuleSet::builtin().unwrap();
        assert_eq!(gather(tmp.path(), rules), vec!["app.js"]);
    }

    #[test]
    fn sibling_stacks_do_not_leak() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/.gitignore", "*.rs\n");
        write(tmp.path(), "a/x.rs", "");
        write(tmp.path(), "b/y.rs", "");

        assert_eq!(
            gather(tmp.path(), RuleSet::empty()),
            vec!["a/.gitignore", "b/y.rs"]
        );
    }

    #[test]
    fn explain_lists_excluded_entries_without_descending() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "target/debug/app", "bin");
        write(tmp.path(), "notes.log", "x");
        write(tmp.path(), "lib.rs", "x");
        let root = tmp.path().canonicalize().unwrap();
        let filter =
            FileFilter::new(&root, &RuleSet::builtin().unwrap(), FilterOptions::default()).unwrap();
        let mut cache = IgnoreCache::new();
        let entries = explain_entries(&filter, &mut cache).unwrap();

        let listed: Vec<(&str, Reason)> = entries
            .iter()
            .map(|e| (e.rel_path.as_str(), e.verdict.reason))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("target", Reason::DirectoryName),
                ("lib.rs", Reason::Accepted),
                (
                    "notes.log",
                    Reason::Rule {
                        rule: crate::filter::FileRule::Miscellaneous
                    }
                ),
            ]
        );
    }

    #[test]
    fn missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let filter =
            FileFilter::new(&missing, &RuleSet::empty(), FilterOptions::default()).unwrap();
        let mut cache = IgnoreCache::new();
        assert!(gather_files(&filter, &mut cache).is_err());
    }
}
