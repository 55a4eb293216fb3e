pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod gather;
pub mod gitignore;
pub mod output;
pub mod rules;
pub mod size;
pub mod source;
pub mod tree;

pub use config::Config;
pub use context::{OutputTarget, PackContext, RunSummary, resolve_output_path, run};
pub use error::{AppError, Result};
pub use filter::{
    Decision, EntryKind, EntryMeta, FileFilter, FileRule, FilterOptions, Reason, Verdict,
};
pub use gather::{ExplainedEntry, GatheredFile, explain_entries, gather_files};
pub use gitignore::{CascadeMatch, IgnoreCache, MatcherStack};
pub use output::AggregateStats;
pub use rules::RuleSet;
pub use size::{human_size, parse_size};
pub use source::{SourceTree, acquire, is_git_url, repo_name_from_url};
pub use tree::{TreeBuilder, TreeNode, render_tree};
