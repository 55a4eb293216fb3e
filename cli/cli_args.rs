use clap::{Args, Parser, Subcommand};

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigFileOpts {
    #[arg(
        long,
        help = "Path/filename of the TOML config file (default: .srcpack/srcpack.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Configuration"
    )]
    pub config: Option<String>,

    #[arg(
        long,
        help = "Do not load any TOML config file.",
        conflicts_with = "config",
        help_heading = "Configuration"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(
        long,
        help = "Include the directory tree [default: from config, enabled].",
        overrides_with = "no_tree",
        help_heading = "Output Control"
    )]
    pub tree: bool,

    #[arg(
        long,
        help = "Omit the directory tree and emit file contents only.",
        overrides_with = "tree",
        help_heading = "Output Control"
    )]
    pub no_tree: bool,

    #[arg(
        long,
        help = "Also exclude auxiliary files (docs, dotfile configs, project metadata).",
        help_heading = "Filtering"
    )]
    pub skip_aux_files: bool,

    #[arg(
        long,
        value_name = "DIRS",
        value_delimiter = ',',
        help = "Additional directory names to exclude (comma separated).",
        help_heading = "Filtering"
    )]
    pub exclude_dirs: Vec<String>,

    #[arg(
        long,
        value_name = "EXTS",
        value_delimiter = ',',
        help = "Additional file extensions to exclude, e.g. 'md,.json'.",
        help_heading = "Filtering"
    )]
    pub exclude_exts: Vec<String>,

    #[arg(
        long,
        value_name = "GLOBS",
        value_delimiter = ',',
        help = "Additional glob patterns to exclude, e.g. '*.min.js,docs/'.",
        help_heading = "Filtering"
    )]
    pub exclude_patterns: Vec<String>,

    #[arg(
        long,
        value_name = "SIZE",
        help = "Skip files larger than SIZE (e.g. '512KiB', '2MB'; '0' disables) [default: 1MiB].",
        help_heading = "Filtering"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        long,
        help = "Disable the built-in exclusion lists (gitignore files still apply).",
        help_heading = "Filtering"
    )]
    pub no_builtin_rules: bool,
}

#[derive(Parser, Debug)]
#[command(
    name = "srcpack",
    author,
    version,
    about = "Pack a source tree into a single text file for AI models.",
    long_about = "srcpack walks a local directory or a cloned git repository, honours nested \n.gitignore files and built-in exclusion lists, and writes a directory tree \nfollowed by the contents of every included file in fenced blocks.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  srcpack generate\n  srcpack g ~/code/project -o context.txt --skip-aux-files\n  srcpack gen https://github.com/user/repo.git --ref main --no-tree\n  srcpack debug -f json",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase message verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "g",
        visible_alias = "gen",
        about = "Write the tree and file contents of a source to one file."
    )]
    Generate(GenerateArgs),

    #[command(
        visible_alias = "d",
        about = "Show effective configuration and the decision for every entry."
    )]
    Debug(DebugArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),

    #[command(about = "Show or save the default configuration file.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(
        value_name = "SOURCE",
        default_value = ".",
        help = "Local directory or git URL to pack."
    )]
    pub source: String,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Output file (default: <source name>.txt in the current directory).",
        conflicts_with = "stdout",
        help_heading = "Output Control"
    )]
    pub output: Option<String>,

    #[arg(
        long,
        help = "Write the result to standard output instead of a file.",
        conflicts_with = "output",
        help_heading = "Output Control"
    )]
    pub stdout: bool,

    #[arg(
        long = "ref",
        value_name = "REF",
        help = "Branch or tag to check out when SOURCE is a git URL."
    )]
    pub git_ref: Option<String>,

    #[clap(flatten)]
    pub config_file: ConfigFileOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[arg(
        value_name = "SOURCE",
        default_value = ".",
        help = "Local directory or git URL to inspect."
    )]
    pub source: String,

    #[arg(
        long = "ref",
        value_name = "REF",
        help = "Branch or tag to check out when SOURCE is a git URL."
    )]
    pub git_ref: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_name = "FORMAT",
        value_parser = ["json"],
        help = "Print structured output instead of tables."
    )]
    pub format: Option<String>,

    #[arg(long, help = "Only list entries that would be included.")]
    pub included_only: bool,

    #[clap(flatten)]
    pub config_file: ConfigFileOpts,
    #[clap(flatten)]
    pub filters: FilterOpts,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        long,
        help = "Save default config to .srcpack/srcpack.toml in the current directory (prompts overwrite)."
    )]
    pub save: bool,
}
