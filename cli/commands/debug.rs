use crate::cli_args::DebugArgs;
use crate::load_config_for_command;
use crate::output::{print_entries_table, print_json, print_section_title};
use anyhow::{Context, Result};
use colored::*;
use log;
use serde::Serialize;
use srcpack_core::{self as core, Config, ExplainedEntry, FileFilter, IgnoreCache};

#[derive(Debug, Serialize)]
struct DebugInfo<'a> {
    source_root: String,
    effective_config: &'a Config,
    included_files: usize,
    entries: Vec<ExplainedEntry>,
}

pub fn handle_debug_command(args: DebugArgs) -> Result<()> {
    let base_dir =
        Config::determine_base_dir(None).context("Failed to determine working directory")?;
    let config = load_config_for_command(&base_dir, &args.config_file, &args.filters)
        .context("Failed to load configuration for debug command")?;

    let source = core::acquire(&args.source, args.git_ref.as_deref())
        .with_context(|| format!("Failed to prepare source '{}'", args.source))?;

    let rules = config.rule_set().context("Failed to build exclusion rules")?;
    let options = config
        .filter_options(None)
        .context("Invalid filter options")?;
    let filter = FileFilter::new(&source.root, &rules, options)
        .context("Failed to build file filter")?;

    log::debug!("Debug: Walking {}...", source.root.display());
    let mut cache = IgnoreCache::new();
    let mut entries = core::explain_entries(&filter, &mut cache)
        .context("Failed to walk source for debug")?;
    log::debug!(
        "Debug: {} entries visited, {} gitignore files loaded.",
        entries.len(),
        cache.loads()
    );

    let included_files = entries
        .iter()
        .filter(|e| !e.is_dir && e.verdict.decision.is_included())
        .count();
    if args.included_only {
        entries.retain(|e| e.verdict.decision.is_included());
    }

    let debug_data = DebugInfo {
        source_root: source.root.display().to_string(),
        effective_config: &config,
        included_files,
        entries,
    };

    if args.format.is_some() {
        print_json(&debug_data)?;
    } else {
        print_debug_info_pretty(&debug_data)?;
    }
    Ok(())
}

fn print_debug_info_pretty(debug_info: &DebugInfo) -> Result<()> {
    print_section_title("Effective Configuration");
    let config_toml = debug_info
        .effective_config
        .to_toml()
        .context("Failed to serialize effective config to TOML")?;
    println!("{}", config_toml);

    print_section_title("Entries");
    println!("{} {}", "Root:".bold(), debug_info.source_root.blue());
    print_entries_table(&debug_info.entries);
    println!(
        "{} {}",
        "Files to include:".bold(),
        debug_info.included_files.to_string().cyan()
    );

    println!("{}", "\n--- End Debug Info ---".green().bold());
    Ok(())
}
