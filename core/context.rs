use crate::config::Config;
use crate::error::{AppError, Result};
use crate::filter::FileFilter;
use crate::gather::{GatheredFile, gather_files};
use crate::gitignore::IgnoreCache;
use crate::output::{self, AggregateStats};
use crate::tree::{TreeBuilder, TreeNode, render_tree};
use log;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub content_bytes: u64,
    pub read_errors: usize,
    pub output: Option<PathBuf>,
}

/// Everything one run decided to emit. Built before any output is opened,
/// so the artifact's temporary file is never part of the walk.
#[derive(Debug, Clone)]
pub struct PackContext {
    pub root: PathBuf,
    pub tree: Option<TreeNode>,
    pub files: Vec<GatheredFile>,
    pub gitignore_loads: usize,
}

impl PackContext {
    /// Tree and file list from one shared matcher cache. A tree failure only
    /// drops the tree; a traversal failure at the root is fatal.
    pub fn build(filter: &FileFilter, include_tree: bool) -> Result<Self> {
        let mut cache = IgnoreCache::new();

        let tree = if include_tree {
            log::info!("Generating file tree...");
            match TreeBuilder::new(filter, &mut cache).build() {
                Ok(tree) => Some(tree),
                Err(e) => {
                    log::error!("Failed to generate file tree, skipping tree output: {}", e);
                    None
                }
            }
        } else {
            log::debug!("Tree output disabled.");
            None
        };

        let files = gather_files(filter, &mut cache)?;
        Ok(Self {
            root: filter.root().to_path_buf(),
            tree,
            files,
            gitignore_loads: cache.loads(),
        })
    }

    pub fn tree_string(&self) -> Option<String> {
        self.tree.as_ref().map(render_tree)
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<AggregateStats> {
        let tree = self.tree_string();
        Ok(output::write_artifact(out, tree.as_deref(), &self.files)?)
    }

    /// Writes next to `output_path` in a temporary file, then renames it into
    /// place (copying when the rename fails).
    pub fn save(&self, output_path: &Path) -> Result<AggregateStats> {
        let write_err = |source: io::Error| AppError::FileWrite {
            path: output_path.to_path_buf(),
            source,
        };
        let dir = output_path.parent().ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "Output path '{}' has no parent directory",
                output_path.display()
            ))
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".srcpack_out_")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;
        log::debug!("Writing to temporary file {}", tmp.path().display());

        let tree = self.tree_string();
        let stats = {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            output::write_artifact(&mut writer, tree.as_deref(), &self.files).map_err(write_err)?
        };

        if let Err(persist_err) = tmp.persist(output_path) {
            log::warn!(
                "Rename into '{}' failed ({}), copying instead",
                output_path.display(),
                persist_err.error
            );
            fs::copy(persist_err.file.path(), output_path).map_err(write_err)?;
        }
        log::info!("Successfully wrote output to {}", output_path.display());
        Ok(stats)
    }
}

/// Absolute artifact path: `requested` (tilde-expanded, relative to `cwd`)
/// or `<source_name>.txt` in `cwd`. The parent directory is created if needed
/// and canonicalized so the path compares equal to walked entries.
pub fn resolve_output_path(
    requested: Option<&str>,
    source_name: &str,
    cwd: &Path,
) -> Result<PathBuf> {
    let raw = match requested.map(str::trim) {
        Some(r) if !r.is_empty() => PathBuf::from(shellexpand::tilde(r).as_ref()),
        _ => PathBuf::from(format!("{}.txt", source_name)),
    };
    let abs = if raw.is_absolute() { raw } else { cwd.join(raw) };

    let file_name = abs
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| {
            AppError::InvalidArgument(format!("Output path '{}' has no file name", abs.display()))
        })?;
    let parent = abs.parent().unwrap_or(cwd);
    fs::create_dir_all(parent).map_err(|e| AppError::FileWrite {
        path: parent.to_path_buf(),
        source: e,
    })?;
    let parent = parent.canonicalize().map_err(|e| {
        AppError::Io(io::Error::new(
            e.kind(),
            format!(
                "Failed to canonicalize output directory '{}': {}",
                parent.display(),
                e
            ),
        ))
    })?;

    let resolved = parent.join(file_name);
    if resolved.is_dir() {
        return Err(AppError::InvalidArgument(format!(
            "Output path '{}' is a directory",
            resolved.display()
        )));
    }
    log::info!("Output will be written to {}", resolved.display());
    Ok(resolved)
}

/// One complete run over an already acquired root.
pub fn run(root: &Path, config: &Config, target: &OutputTarget) -> Result<RunSummary> {
    let output_file = match target {
        OutputTarget::File(path) => Some(path.clone()),
        OutputTarget::Stdout => None,
    };
    let rules = config.rule_set()?;
    let filter = FileFilter::new(root, &rules, config.filter_options(output_file.clone())?)?;
    let context = PackContext::build(&filter, config.general.tree)?;

    let stats = match target {
        OutputTarget::File(path) => context.save(path)?,
        OutputTarget::Stdout => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            context.write_to(&mut lock)?
        }
    };
    if stats.read_errors > 0 {
        log::warn!("{} file(s) could not be read; see notes in the output.", stats.read_errors);
    }
    Ok(RunSummary {
        files: stats.files,
        content_bytes: stats.content_bytes,
        read_errors: stats.read_errors,
        output: output_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOptions;
    use crate::rules::RuleSet;
    use tempfile::TempDir;

    #[test]
    fn default_output_name_uses_source_name() {
        let tmp = TempDir::new().unwrap();
        let cwd = tmp.path().canonicalize().unwrap();
        assert_eq!(
            resolve_output_path(None, "proj", &cwd).unwrap(),
            cwd.join("proj.txt")
        );
        assert_eq!(
            resolve_output_path(Some("./out.txt"), "proj", &cwd).unwrap(),
            cwd.join("out.txt")
        );
        assert_eq!(
            resolve_output_path(Some("nested/dir/ctx.md"), "proj", &cwd).unwrap(),
            cwd.join("nested/dir/ctx.md")
        );
    }

    #[test]
    fn output_path_may_not_be_a_directory() {
        let tmp = TempDir::new().unwrap();
        let cwd = tmp.path().canonicalize().unwrap();
        fs::create_dir(cwd.join("taken")).unwrap();
        assert!(matches!(
            resolve_output_path(Some("taken"), "proj", &cwd),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn save_replaces_existing_file_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::write(root.join("main.rs"), "fn main() {}\n").unwrap();
        let out = root.join("out.txt");
        fs::write(&out, "stale").unwrap();

        let filter = FileFilter::new(
            &root,
            &RuleSet::empty(),
            FilterOptions {
                output_file: Some(out.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        let context = PackContext::build(&filter, false).unwrap();
        let stats = context.save(&out).unwrap();

        assert_eq!(stats.files, 1);
        assert_eq!(fs::read_to_string(&out).unwrap(), "```main.rs\nfn main() {}\n```\n\n");
        let leftovers: Vec<_> = fs::read_dir(&root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
