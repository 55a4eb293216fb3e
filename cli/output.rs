use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use srcpack_core::{Decision, ExplainedEntry, RunSummary, human_size};
use std::io::{self, Write};

pub fn print_run_summary(summary: &RunSummary, source_name: &str, quiet: bool) {
    if quiet {
        return;
    }
    // Nothing goes to stdout when it carries the artifact.
    let Some(path) = &summary.output else {
        return;
    };
    println!(
        "{} Packed {} files ({}) from {} into: {}",
        "✅".green(),
        summary.files.to_string().cyan(),
        human_size(summary.content_bytes).cyan(),
        source_name.bold(),
        path.display().to_string().blue()
    );
    if summary.read_errors > 0 {
        println!(
            "{} {} file(s) could not be read; their blocks contain an error note.",
            "⚠️".yellow(),
            summary.read_errors.to_string().yellow()
        );
    }
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content =
        serde_json::to_string_pretty(data).context("Failed to serialize output to JSON")?;
    write_to_stdout(&content)
}

pub fn print_section_title(title: &str) {
    println!(
        "{}",
        format!("\n--- {} ---", title).green().bold().underline()
    );
}

pub fn print_entries_table(entries: &[ExplainedEntry]) {
    if entries.is_empty() {
        println!("{}", "(None)".dimmed());
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Green),
        Cell::new("Decision").fg(Color::Green),
        Cell::new("Reason").fg(Color::Green),
        Cell::new("Size").fg(Color::Green),
    ]);
    for entry in entries {
        let path = if entry.is_dir {
            format!("{}/", entry.rel_path)
        } else {
            entry.rel_path.clone()
        };
        let (decision, color) = match entry.verdict.decision {
            Decision::Include => ("include", Color::Cyan),
            Decision::ExcludeEntry => ("exclude", Color::Yellow),
            Decision::ExcludeSubtree => ("exclude subtree", Color::Magenta),
        };
        let size = if entry.is_dir {
            String::new()
        } else {
            human_size(entry.size)
        };
        table.add_row(vec![
            Cell::new(path).fg(color),
            Cell::new(decision).fg(color),
            Cell::new(entry.verdict.reason.to_string()),
            Cell::new(size)
                .set_alignment(CellAlignment::Right)
                .fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");
}

fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
