use crate::cli_args::ConfigArgs;
use anyhow::{Context, Result};
use colored::*;
use srcpack_core::Config;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn handle_config_command(args: &ConfigArgs, base_dir: &Path, quiet: bool) -> Result<()> {
    let content = Config::default()
        .to_toml()
        .context("Failed to serialize default config")?;

    if !args.save {
        print!("{}", content);
        io::stdout().flush().context("Failed to flush stdout")?;
        return Ok(());
    }

    let save_path = Config::default_config_path(base_dir);
    if save_path.exists() {
        if quiet {
            anyhow::bail!(
                "Target file '{}' exists. Overwrite prevented in quiet mode.",
                save_path.display()
            );
        }
        print!(
            "{} Config file already exists at '{}'. Overwrite? [{}/{}] ",
            "⚠️".yellow(),
            save_path.display().to_string().cyan(),
            "y".green(),
            "N".red()
        );
        io::stdout().flush().context("Failed to flush stdout")?;
        let mut response = String::new();
        io::stdin()
            .read_line(&mut response)
            .context("Failed to read user input")?;
        if !response.trim().eq_ignore_ascii_case("y") {
            println!("Save cancelled.");
            return Ok(());
        }
    }

    if let Some(parent) = save_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(&save_path, content)
        .with_context(|| format!("Failed to write config to {}", save_path.display()))?;

    if !quiet {
        println!(
            "{} Default config saved to: {}",
            "✅".green(),
            save_path.display().to_string().blue()
        );
    }
    Ok(())
}
