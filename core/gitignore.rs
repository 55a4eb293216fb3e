//! Compiled `.gitignore` matchers and the per-directory cascade.
//!
//! [`IgnoreCache`] compiles each directory's `.gitignore` at most once per
//! run. [`MatcherStack`] holds the matchers from the traversal root down to
//! the current directory and answers "is this path ignored" deepest-first.

use crate::error::{AppError, Result};
use ignore::Match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const GITIGNORE_FILE: &str = ".gitignore";

/// Memoizes compiled matchers by absolute `.gitignore` path.
///
/// `None` entries mark directories without a usable `.gitignore` (missing or
/// broken); they are never re-read for the lifetime of the cache.
#[derive(Debug, Default)]
pub struct IgnoreCache {
    entries: HashMap<PathBuf, Option<Rc<Gitignore>>>,
    loads: usize,
}

impl IgnoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matcher for `dir/.gitignore`, compiling it on first request.
    pub fn compile(&mut self, dir: &Path) -> Option<Rc<Gitignore>> {
        let key = dir.join(GITIGNORE_FILE);
        if let Some(cached) = self.entries.get(&key) {
            log::trace!("Gitignore cache hit: {}", key.display());
            return cached.clone();
        }

        let compiled = match fs::metadata(&key) {
            Ok(meta) if meta.is_file() => {
                self.loads += 1;
                match load_gitignore(dir, &key) {
                    Ok(gi) => {
                        log::debug!(
                            "Compiled {} ({} patterns)",
                            key.display(),
                            gi.num_ignores() + gi.num_whitelists()
                        );
                        Some(Rc::new(gi))
                    }
                    Err(e) => {
                        log::warn!(
                            "Ignoring unusable gitignore '{}': {}",
                            key.display(),
                            e
                        );
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Cannot stat '{}': {}", key.display(), e);
                None
            }
        };

        self.entries.insert(key, compiled.clone());
        compiled
    }

    /// Number of `.gitignore` files actually read from disk.
    pub fn loads(&self) -> usize {
        self.loads
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_gitignore(dir: &Path, path: &Path) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(dir);
    if let Some(err) = builder.add(path) {
        return Err(AppError::Ignore(err));
    }
    Ok(builder.build()?)
}

/// Outcome of running a path through the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeMatch {
    /// Ignored by the matcher at `level` (0 = root-most).
    Ignored { level: usize },
    /// Re-included by a negation at `level`; ancestors are not consulted.
    Whitelisted { level: usize },
    Unmatched,
}

/// Active matchers, root-most first.
#[derive(Debug, Clone, Default)]
pub struct MatcherStack {
    matchers: Vec<Rc<Gitignore>>,
}

impl MatcherStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this stack with `own` appended. The push is skipped when `own`
    /// is absent or already the last element.
    pub fn extended(&self, own: Option<Rc<Gitignore>>) -> Self {
        let mut next = self.clone();
        if let Some(gi) = own {
            let duplicate = next.matchers.last().is_some_and(|last| Rc::ptr_eq(last, &gi));
            if !duplicate {
                next.matchers.push(gi);
            }
        }
        next
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn cascade(&self, path: &Path, is_dir: bool) -> CascadeMatch {
        for (level, gi) in self.matchers.iter().enumerate().rev() {
            match gi.matched(path, is_dir) {
                Match::Ignore(_) => return CascadeMatch::Ignored { level },
                Match::Whitelist(_) => return CascadeMatch::Whitelisted { level },
                Match::None => {}
            }
        }
        CascadeMatch::Unmatched
    }
}
