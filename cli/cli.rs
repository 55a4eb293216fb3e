mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use log;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, ConfigFileOpts, FilterOpts};
use srcpack_core::{AppError, Config};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);

            // Config and argument errors are shown even in quiet mode.
            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::TomlSerialize(_)) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::Metadata { .. }) => 2,
        Some(AppError::WalkDir(_)) => 2,
        Some(AppError::Ignore(_)) => 2,
        Some(AppError::SourcePath(_)) => 2,
        Some(AppError::GitClone(_)) => 2,
        Some(AppError::Glob(_)) => 5,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(AppError::SizeParse(_)) => 5,
        Some(AppError::YamlError(_)) => 6,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Generate(args) => {
                log::debug!("Executing 'generate' command...");
                commands::generate::handle_generate_command(args, quiet)?;
            }
            Commands::Debug(args) => {
                log::debug!("Executing 'debug' command...");
                commands::debug::handle_debug_command(args)?;
            }
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                let base_dir = Config::determine_base_dir(None)
                    .context("Failed to determine working directory for config command")?;
                commands::config::handle_config_command(&args, &base_dir, quiet)?;
            }
        },
    }
    Ok(())
}

fn merge_config_with_cli_overrides(mut config: Config, filters: &FilterOpts) -> Config {
    log::trace!("Applying CLI overrides to config...");

    if filters.no_tree {
        config.general.tree = false;
    }
    if filters.tree {
        config.general.tree = true;
    }
    if filters.skip_aux_files {
        config.general.skip_aux_files = true;
    }
    if let Some(size) = &filters.max_file_size {
        config.general.max_file_size = size.clone();
    }
    if filters.no_builtin_rules {
        config.rules.use_builtin = false;
    }

    config.exclude.dirs.extend(filters.exclude_dirs.iter().cloned());
    config
        .exclude
        .extensions
        .extend(filters.exclude_exts.iter().cloned());
    config
        .exclude
        .patterns
        .extend(filters.exclude_patterns.iter().cloned());

    log::trace!("Config after CLI overrides: {:?}", config);
    config
}

/// Config file (if any) under `base_dir`, with the command's flags applied.
pub fn load_config_for_command(
    base_dir: &Path,
    config_opts: &ConfigFileOpts,
    filters: &FilterOpts,
) -> Result<Config> {
    let config_path =
        Config::resolve_config_path(base_dir, config_opts.config.as_ref(), config_opts.no_config)
            .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    Ok(merge_config_with_cli_overrides(config, filters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_extend_and_override_config() {
        let mut config = Config::default();
        config.exclude.dirs = vec!["generated".to_string()];
        let filters = FilterOpts {
            no_tree: true,
            skip_aux_files: true,
            exclude_dirs: vec!["vendor".to_string()],
            exclude_exts: vec!["md".to_string()],
            max_file_size: Some("2KiB".to_string()),
            no_builtin_rules: true,
            ..Default::default()
        };

        let merged = merge_config_with_cli_overrides(config, &filters);
        assert!(!merged.general.tree);
        assert!(merged.general.skip_aux_files);
        assert_eq!(merged.general.max_file_size, "2KiB");
        assert!(!merged.rules.use_builtin);
        assert_eq!(merged.exclude.dirs, vec!["generated", "vendor"]);
        assert_eq!(merged.exclude.extensions, vec!["md"]);
    }

    #[test]
    fn untouched_flags_keep_config_values() {
        let mut config = Config::default();
        config.general.tree = false;
        config.general.max_file_size = "0".to_string();
        let merged = merge_config_with_cli_overrides(config.clone(), &FilterOpts::default());
        assert_eq!(merged, config);
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let err = anyhow::Error::new(AppError::SizeParse("bad".into()));
        assert_eq!(exit_code_for(&err), 5);
        let err = anyhow::Error::new(AppError::SourcePath("gone".into()));
        assert_eq!(exit_code_for(&err), 2);
        let err = anyhow::Error::new(AppError::TomlParse("bad".into()))
            .context("Failed to load config");
        assert_eq!(exit_code_for(&err), 1);
        let err = anyhow::Error::new(
            srcpack_core::RuleSet::from_yaml("exclude_dirs: [").unwrap_err(),
        );
        assert_eq!(exit_code_for(&err), 6);
        assert_eq!(exit_code_for(&anyhow::anyhow!("plain")), 1);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
