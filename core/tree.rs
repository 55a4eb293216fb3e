use crate::error::{AppError, Result};
use crate::filter::{Decision, EntryMeta, FileFilter};
use crate::gather::compare_entries;
use crate::gitignore::{IgnoreCache, MatcherStack};
use log;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const BRANCH: &str = "├── ";
const CORNER: &str = "└── ";
const PIPE: &str = "│   ";
const BLANK: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Forward-slash paths of every file below this node, relative to it,
    /// in display order.
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_file_paths(&self.children, "", &mut out);
        out
    }
}

fn collect_file_paths(children: &[TreeNode], prefix: &str, out: &mut Vec<String>) {
    for child in children {
        let path = if prefix.is_empty() {
            child.name.clone()
        } else {
            format!("{}/{}", prefix, child.name)
        };
        if child.is_dir {
            collect_file_paths(&child.children, &path, out);
        } else {
            out.push(path);
        }
    }
}

/// Builds the display tree with the same decision engine and matcher cache
/// the traversal driver uses.
pub struct TreeBuilder<'a> {
    filter: &'a FileFilter,
    cache: &'a mut IgnoreCache,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(filter: &'a FileFilter, cache: &'a mut IgnoreCache) -> Self {
        Self { filter, cache }
    }

    pub fn build(&mut self) -> Result<TreeNode> {
        let root = self.filter.root().to_path_buf();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let stack = MatcherStack::new().extended(self.cache.compile(&root));
        let children = self.children_of(&root, &stack).map_err(|e| AppError::FileRead {
            path: root.clone(),
            source: e,
        })?;
        log::debug!("Tree built for {}", root.display());
        Ok(TreeNode {
            name,
            is_dir: true,
            children,
        })
    }

    fn children_of(&mut self, dir: &Path, stack: &MatcherStack) -> io::Result<Vec<TreeNode>> {
        let mut listing: Vec<(PathBuf, OsString, bool)> = Vec::new();
        for entry_result in fs::read_dir(dir)? {
            match entry_result {
                Ok(entry) => {
                    let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
                    listing.push((entry.path(), entry.file_name(), is_dir));
                }
                Err(e) => log::warn!("Error listing '{}' (entry skipped): {}", dir.display(), e),
            }
        }
        listing.sort_by(|a, b| compare_entries(a.2, &a.1, b.2, &b.1));

        let mut nodes = Vec::with_capacity(listing.len());
        for (path, file_name, _) in listing {
            let md = match fs::symlink_metadata(&path) {
                Ok(md) => md,
                Err(e) => {
                    log::warn!("Cannot read metadata for '{}' (skipped): {}", path.display(), e);
                    continue;
                }
            };
            let meta = EntryMeta::from_metadata(&md);
            if self.filter.decide(&path, &meta, stack) != Decision::Include {
                continue;
            }

            let name = file_name.to_string_lossy().into_owned();
            if meta.is_dir() {
                let child_stack = stack.extended(self.cache.compile(&path));
                let children = self.children_of(&path, &child_stack).unwrap_or_else(|e| {
                    log::warn!(
                        "Failed to read directory '{}' (children omitted): {}",
                        path.display(),
                        e
                    );
                    Vec::new()
                });
                nodes.push(TreeNode {
                    name,
                    is_dir: true,
                    children,
                });
            } else {
                nodes.push(TreeNode {
                    name,
                    is_dir: false,
                    children: Vec::new(),
                });
            }
        }
        Ok(nodes)
    }
}

/// Root name on the first line, then one connector-prefixed line per entry.
pub fn render_tree(root: &TreeNode) -> String {
    let mut out = String::new();
    out.push_str(&root.name);
    out.push('\n');
    render_children(&root.children, "", &mut out);
    out
}

fn render_children(children: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if last { CORNER } else { BRANCH });
        out.push_str(&child.name);
        out.push('\n');
        if child.is_dir && !child.children.is_empty() {
            let next = format!("{}{}", prefix, if last { BLANK } else { PIPE });
            render_children(&child.children, &next, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOptions;
    use crate::rules::RuleSet;
    use tempfile::TempDir;

    fn leaf(name: &str) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            is_dir: false,
            children: Vec::new(),
        }
    }

    fn dir(name: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            name: name.to_string(),
            is_dir: true,
            children,
        }
    }

    #[test]
    fn renders_connectors_and_indents() {
        let tree = dir(
            "proj",
            vec![
                dir("src", vec![dir("util", vec![leaf("io.rs")]), leaf("main.rs")]),
                dir("empty", vec![]),
                leaf("README.md"),
            ],
        );
        let expected = "proj\n\
                        ├── src\n\
                        │   ├── util\n\
                        │   │   └── io.rs\n\
                        │   └── main.rs\n\
                        ├── empty\n\
                        └── README.md\n";
        assert_eq!(render_tree(&tree), expected);
        assert_eq!(tree.file_paths(), vec!["src/util/io.rs", "src/main.rs", "README.md"]);
    }

    #[test]
    fn root_only_tree_is_single_line() {
        assert_eq!(render_tree(&dir("solo", vec![])), "solo\n");
    }

    #[test]
    fn builder_applies_filter_and_ordering() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/guide.md"), "g").unwrap();
        fs::write(root.join("b.rs"), "b").unwrap();
        fs::write(root.join("A.rs"), "a").unwrap();
        fs::write(root.join("skip.tmp"), "t").unwrap();
        fs::write(root.join(".gitignore"), "*.tmp\n").unwrap();

        let filter = FileFilter::new(&root, &RuleSet::empty(), FilterOptions::default()).unwrap();
        let mut cache = IgnoreCache::new();
        let tree = TreeBuilder::new(&filter, &mut cache).build().unwrap();

        assert!(tree.is_dir);
        assert_eq!(tree.file_paths(), vec!["docs/guide.md", ".gitignore", "A.rs", "b.rs"]);
    }
}
