use crate::cli_args::GenerateArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use log;
use srcpack_core::{self as core, Config, OutputTarget};
use std::env;

pub fn handle_generate_command(args: GenerateArgs, quiet: bool) -> Result<()> {
    let base_dir =
        Config::determine_base_dir(None).context("Failed to determine working directory")?;
    let config = load_config_for_command(&base_dir, &args.config_file, &args.filters)
        .context("Failed to load configuration")?;

    // Validate before a possibly slow clone.
    config
        .max_file_size_bytes()
        .context("Invalid maximum file size")?;

    let source = core::acquire(&args.source, args.git_ref.as_deref())
        .with_context(|| format!("Failed to prepare source '{}'", args.source))?;
    log::info!(
        "Source '{}' resolved to {}{}",
        source.name,
        source.root.display(),
        if source.is_clone() { " (temporary clone)" } else { "" }
    );

    let target = if args.stdout {
        OutputTarget::Stdout
    } else {
        let cwd = env::current_dir().context("Failed to read current directory")?;
        let requested = args.output.as_deref().or(config.output.file.as_deref());
        let path = core::resolve_output_path(requested, &source.name, &cwd)
            .context("Failed to resolve output path")?;
        OutputTarget::File(path)
    };

    let summary = core::run(&source.root, &config, &target)
        .with_context(|| format!("Failed to pack '{}'", source.root.display()))?;
    output::print_run_summary(&summary, &source.name, quiet);
    Ok(())
}
