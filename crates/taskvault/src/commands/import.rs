//! Import command: sync an agent todo list into a project's task tree.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::open_manager;
use crate::config::Config;
use crate::output;
use crate::todo_sync::{self, ParentRef, SyncAction, SyncReport};

/// Execute import command.
pub fn execute(path: &Path, project: &str, dry_run: bool, backup: bool, config: &Config, json: bool) -> Result<()> {
    let todos = todo_sync::read_todos(path)?;
    let manager = open_manager(config)?;
    let existing = if manager.project_exists(project) {
        manager.get_task_manager(project)?.get_all_tasks()?
    } else {
        Vec::new()
    };
    let actions = todo_sync::plan(&todos, &existing);

    if dry_run {
        if json {
            return output::print_json(&actions);
        }
        println!("{} Dry run: nothing will be written", "⚠".yellow());
        for action in &actions {
            println!("  {}", describe(action, &actions));
        }
        print_report(&SyncReport::from_plan(&actions));
        return Ok(());
    }

    manager.create_project(project)?;
    let store = manager.get_task_manager(project)?;
    if backup {
        let target = todo_sync::backup_project(store.project_dir(), &config.backups_dir())?;
        println!("{} Backed up project to {}", "✓".green(), target.display());
    }

    let report = todo_sync::apply(&store, &actions)?;
    if json {
        return output::print_json(&report);
    }
    println!("{} Imported {} todo item(s)", "✓".green(), todos.len());
    print_report(&report);
    Ok(())
}

fn describe(action: &SyncAction, actions: &[SyncAction]) -> String {
    match action {
        SyncAction::Create { title, status, parent } => {
            let under = match parent {
                Some(ParentRef::Planned(index)) => match actions.get(*index) {
                    Some(SyncAction::Create { title, .. }) => format!(" under '{}'", title),
                    _ => String::new(),
                },
                Some(ParentRef::Existing(id)) => {
                    let title = actions.iter().find_map(|a| match a {
                        SyncAction::UpdateStatus { task_id, title, .. }
                        | SyncAction::Unchanged { task_id, title } if task_id == id => Some(title.as_str()),
                        _ => None,
                    });
                    format!(" under '{}'", title.unwrap_or(id.as_str()))
                }
                None => String::new(),
            };
            format!("{} {} [{}]{}", "+".green(), title, status, under)
        }
        SyncAction::UpdateStatus { title, from, to, .. } => {
            format!("{} {} [{} -> {}]", "~".yellow(), title, from, to)
        }
        SyncAction::Unchanged { title, .. } => format!("{} {}", "=".dimmed(), title),
        SyncAction::Repeat { title, .. } => format!("{} {} (repeated)", "=".dimmed(), title),
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "  {} created, {} updated, {} unchanged",
        report.created.to_string().green(),
        report.updated.to_string().yellow(),
        report.unchanged
    );
}
