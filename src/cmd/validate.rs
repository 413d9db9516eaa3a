//! `validate` command: configuration and log file checks for CI pipelines
//! and quick debugging.

use super::ValidateArgs;
use crate::config;
use crate::filter::FilterEngine;
use colored::Colorize;
use regex::Regex;
use std::path::Path;

pub fn run(args: ValidateArgs, config_override: Option<&Path>) -> Result<(), i32> {
    let mut failed = false;

    match config::load(config_override) {
        Ok((cfg, path)) => {
            println!("{} configuration {}", "✓".green(), path.display());

            let engine = FilterEngine::new();
            for query in &cfg.saved_queries {
                match engine.validate(&query.query, query.is_regex) {
                    Ok(()) => println!("{} saved query '{}'", "✓".green(), query.name),
                    Err(e) => {
                        eprintln!("{} saved query '{}': {}", "✗".red(), query.name, e);
                        failed = true;
                    }
                }
            }
            for rule in &cfg.highlight_rules {
                if let Err(e) = Regex::new(&rule.pattern) {
                    eprintln!("{} highlight rule '{}': {}", "✗".red(), rule.name, e);
                    failed = true;
                }
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            failed = true;
        }
    }

    for file in &args.files {
        match std::fs::metadata(file) {
            Ok(meta) if meta.is_file() => {
                println!("{} file {}", "✓".green(), file.display());
            }
            Ok(_) => {
                eprintln!("{} {} is not a regular file", "✗".red(), file.display());
                failed = true;
            }
            Err(e) => {
                eprintln!("{} file {}: {}", "✗".red(), file.display(), e);
                failed = true;
            }
        }
    }

    if failed {
        Err(1)
    } else {
        println!("Validation completed");
        Ok(())
    }
}
