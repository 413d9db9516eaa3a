//! `config show` and `config edit` commands.

use crate::config;
use colored::Colorize;
use std::path::Path;
use std::process::Command;

/// Print the effective configuration. Exit 0 on success, 1 on load errors.
pub fn show(config_override: Option<&Path>) -> Result<(), i32> {
    let (cfg, path) = config::load(config_override).map_err(|e| {
        eprintln!("{}", e);
        1
    })?;

    println!("Using: {}", path.display().to_string().dimmed());
    println!();
    println!("{}: {}", "theme".cyan(), cfg.ui.theme.green());
    println!("{}: {}", "context_lines".cyan(), cfg.ui.context_lines);
    println!("{}: {}", "max_buffer_lines".cyan(), cfg.ui.max_buffer_lines);
    println!("{}: {} ms", "refresh_rate".cyan(), cfg.ui.refresh_rate_ms);
    println!(
        "{}: {}",
        "show_line_numbers".cyan(),
        cfg.ui.show_line_numbers
    );
    println!(
        "{}: {} ms",
        "rotation_check".cyan(),
        cfg.general.file_rotation_check_ms
    );
    println!();
    println!("{}: {}", "highlight_rules".cyan(), cfg.highlight_rules.len());
    for rule in &cfg.highlight_rules {
        println!("  - {} ({})", rule.name.green(), rule.color);
    }
    println!();
    println!("{}: {}", "saved_queries".cyan(), cfg.saved_queries.len());
    for query in &cfg.saved_queries {
        println!("  - {}: {}", query.name.green(), query.query.yellow());
    }
    if !cfg.shortcuts.is_empty() {
        println!();
        println!("{}: {}", "shortcuts".cyan(), cfg.shortcuts.len());
        for (word, expansion) in &cfg.shortcuts {
            println!("  - {} -> {}", word.green(), expansion.yellow());
        }
    }
    Ok(())
}

/// Open the config file in `$EDITOR` (fallback `vi`). Exit 0 when the
/// editor exits cleanly.
pub fn edit(config_override: Option<&Path>) -> Result<(), i32> {
    // Loading first guarantees the file exists with defaults.
    let (_, path) = config::load(config_override).map_err(|e| {
        eprintln!("{}", e);
        1
    })?;

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = Command::new(&editor).arg(&path).status().map_err(|e| {
        eprintln!("Failed to launch {}: {}", editor, e);
        1
    })?;
    if !status.success() {
        eprintln!("{} exited with {}", editor, status);
        return Err(1);
    }

    // Re-parse so syntax errors surface immediately after editing.
    match config::load(Some(&path)) {
        Ok(_) => {
            println!("{}", "Configuration OK".green());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            Err(1)
        }
    }
}
