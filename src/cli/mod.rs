//! CLI command handling
//!
//! Dispatches CLI commands to the runner and formats output.

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::commands::Commands;
use crate::common::config::{load_script, RunnerConfig};
use crate::common::{Error, Result};
use crate::driver::{MemoryDocument, Page};
use crate::runner::{all_commands, ExecutionEngine, Step};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config,
            page,
            script,
            json,
        } => run(&config, &page, script.as_deref(), json).await,
        Commands::Check { script } => check(&script),
        Commands::Commands { json } => list_commands(json),
    }
}

async fn run(config_path: &Path, page_path: &Path, script: Option<&Path>, json: bool) -> Result<()> {
    let config = RunnerConfig::load(config_path)?;
    let lines = match script {
        Some(path) => load_script(path)?,
        None => config.load_script()?,
    };
    let page = Page::load(page_path)?;

    let document = MemoryDocument::from_page(&page);
    let mut engine = ExecutionEngine::new(Arc::new(document), &config);
    engine.load(lines.as_slice())?;

    let Some(report) = engine.run().await? else {
        if json {
            println!("{}", serde_json::json!({ "status": "empty" }));
        } else {
            println!("{}", "No commands were reported".dimmed());
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(Error::RunFailed {
            failed: report.failed_count(),
            incomplete: report.incomplete.len(),
        })
    }
}

fn check(path: &Path) -> Result<()> {
    let lines = load_script(path)?;

    for (i, line) in lines.iter().enumerate() {
        let step = Step::parse(line).map_err(|e| e.at_line(i + 1))?;
        let args = step
            .command
            .args
            .iter()
            .map(|a| format!("{:?}", a))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {} {:>3}: {} [{}]",
            "✓".green(),
            i + 1,
            step.action.name(),
            args.dimmed()
        );
    }

    println!("\n{} {} commands", "Valid:".green().bold(), lines.len());
    Ok(())
}

fn list_commands(json: bool) -> Result<()> {
    if json {
        let commands: Vec<_> = all_commands()
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "aliases": c.aliases,
                    "args": c.args,
                    "reported": c.reported,
                    "synthetic": c.synthetic,
                    "description": c.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&commands)?);
        return Ok(());
    }

    for info in all_commands() {
        let signature = format!("{}({})", info.name, info.args.join(", "));
        let mut notes = Vec::new();
        if !info.aliases.is_empty() {
            notes.push(format!("alias: {}", info.aliases.join(", ")));
        }
        if !info.reported {
            notes.push("not reported".to_string());
        }
        if info.synthetic {
            notes.push("injected by the runner".to_string());
        }

        let signature = format!("{:34}", signature);
        if notes.is_empty() {
            println!("  {} {}", signature.bold(), info.description);
        } else {
            println!(
                "  {} {} {}",
                signature.bold(),
                info.description,
                format!("({})", notes.join("; ")).dimmed()
            );
        }
    }
    Ok(())
}
