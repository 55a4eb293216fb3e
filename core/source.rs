use crate::error::{AppError, Result};
use log;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const FALLBACK_REPO_NAME: &str = "repository";

/// A directory ready to be traversed.
///
/// For cloned repositories the checkout is removed when this value drops.
#[derive(Debug)]
pub struct SourceTree {
    pub root: PathBuf,
    pub name: String,
    clone_dir: Option<TempDir>,
}

impl SourceTree {
    pub fn is_clone(&self) -> bool {
        self.clone_dir.is_some()
    }
}

/// `true` for inputs that look like something `git clone` understands.
pub fn is_git_url(source: &str) -> bool {
    source.starts_with("http://")
        || source.starts_with("https://")
        || source.starts_with("git@")
        || source.starts_with("ssh://")
        || source.ends_with(".git")
}

/// Last path segment of a clone URL without `.git`.
pub fn repo_name_from_url(url: &str) -> String {
    let mut rest = url.trim();
    for scheme in ["https://", "http://", "ssh://"] {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }
    let scp_form;
    if let Some(stripped) = rest.strip_prefix("git@") {
        scp_form = stripped.replacen(':', "/", 1);
        rest = &scp_form;
    }
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    match rest.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => FALLBACK_REPO_NAME.to_string(),
    }
}

/// Resolves `source` to a directory: a local path (tilde-expanded,
/// canonicalized) or a fresh shallow clone of a git URL.
pub fn acquire(source: &str, git_ref: Option<&str>) -> Result<SourceTree> {
    if is_git_url(source) {
        return clone_repository(source, git_ref);
    }
    if git_ref.is_some() {
        log::warn!("--ref is ignored for local source '{}'", source);
    }

    let expanded = PathBuf::from(shellexpand::tilde(source).as_ref());
    let root = expanded.canonicalize().map_err(|e| {
        AppError::SourcePath(format!(
            "Cannot resolve source path '{}': {}",
            expanded.display(),
            e
        ))
    })?;
    if !root.is_dir() {
        return Err(AppError::SourcePath(format!(
            "Source path '{}' is not a directory",
            root.display()
        )));
    }
    let name = dir_display_name(&root);
    log::info!("Processing local path: {}", root.display());
    Ok(SourceTree {
        root,
        name,
        clone_dir: None,
    })
}

fn clone_repository(url: &str, git_ref: Option<&str>) -> Result<SourceTree> {
    let temp = tempfile::Builder::new()
        .prefix("srcpack_clone_")
        .tempdir()
        .map_err(|e| AppError::GitClone(format!("Failed to create temporary directory: {}", e)))?;
    let name = repo_name_from_url(url);
    let clone_path = temp.path().join(&name);

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--no-tags", "--no-recurse-submodules"]);
    if let Some(r) = git_ref {
        cmd.args(["--branch", r, "--single-branch"]);
    }
    cmd.args(["--depth", "1"]).arg(url).arg(&clone_path);

    log::info!("Cloning {} (ref: {})", url, git_ref.unwrap_or("default"));
    log::debug!("Executing: {:?}", cmd);
    let output = cmd.output().map_err(|e| {
        AppError::GitClone(format!("Failed to run git (is it installed?): {}", e))
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::GitClone(format!(
            "git clone of '{}' failed ({}): {}",
            url,
            output.status,
            stderr.trim()
        )));
    }

    let root = clone_path.canonicalize().map_err(|e| {
        AppError::GitClone(format!(
            "Cloned repository missing at '{}': {}",
            clone_path.display(),
            e
        ))
    })?;
    log::info!("Repository cloned to {}", root.display());
    Ok(SourceTree {
        root,
        name,
        clone_dir: Some(temp),
    })
}

/// Folder name of `root`, falling back to the current directory's name for
/// roots like `/`.
fn dir_display_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            env::current_dir()
                .ok()
                .and_then(|cwd| cwd.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| FALLBACK_REPO_NAME.to_string())
}
