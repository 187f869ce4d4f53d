//! Knowledge command for project knowledge base management.
//!
//! Entries are typed notes (decisions, practices, lessons, context, ...)
//! that can be searched and linked to tasks.

use anyhow::Result;
use colored::Colorize;
use taskvault_core::{KnowledgeEntry, KnowledgeType};

use super::{open_manager, resolve_entry, resolve_task};
use crate::cli::{KnowledgeAction, KnowledgeCommand};
use crate::config::Config;
use crate::output;

/// Execute knowledge command.
pub fn execute(cmd: KnowledgeCommand, config: &Config, json: bool) -> Result<()> {
    let manager = open_manager(config)?;
    let project = cmd.project.name()?;
    let store = manager.get_knowledge_store(project)?;

    match cmd.action {
        KnowledgeAction::Add {
            title,
            content,
            entry_type,
            source,
            tags,
        } => {
            let entry_type: KnowledgeType = entry_type.parse()?;
            let entry = store.add_entry(&title, &content, entry_type, tags, source)?;
            if json {
                return output::print_json(&entry);
            }
            println!("{} Knowledge added", "✓".green());
            println!("  Type: {}", entry.entry_type.to_string().cyan());
            println!("  Title: {}", entry.title.bold());
            println!("  ID: {}", &entry.id[..8]);
            if let Some(src) = &entry.source {
                println!("  Source: {}", src.dimmed());
            }
            if !entry.tags.is_empty() {
                let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
                println!("  Tags: {}", tags.join(", ").dimmed());
            }
        }

        KnowledgeAction::Search { query } => {
            let entries = store.search_entries(&query)?;
            print_entries(&entries, &format!("matching '{}'", query), json)?;
        }

        KnowledgeAction::Link {
            entry_id,
            task_id,
            unlink,
        } => {
            let entry = resolve_entry(&store, &entry_id)?;
            let tasks = manager.get_task_manager(project)?;
            let task = resolve_task(&tasks, &task_id)?;
            if unlink {
                store.unlink_from_task(&entry.id, &task.id)?;
                println!("{} Unlinked {} from {}", "✓".green(), entry.title.bold(), task.title);
            } else {
                store.link_to_task(&entry.id, &task.id)?;
                println!("{} Linked {} to {}", "✓".green(), entry.title.bold(), task.title);
            }
        }

        KnowledgeAction::List {
            entry_type,
            tag,
            task,
            limit,
        } => {
            let mut entries = match &task {
                Some(task_id) => {
                    let tasks = manager.get_task_manager(project)?;
                    store.get_entries_for_task(&resolve_task(&tasks, task_id)?.id)?
                }
                None => store.recent_entries(usize::MAX)?,
            };
            if let Some(entry_type) = entry_type {
                let entry_type: KnowledgeType = entry_type.parse()?;
                entries.retain(|e| e.entry_type == entry_type);
            }
            if let Some(tag) = tag {
                entries.retain(|e| e.tags.contains(&tag));
            }
            entries.truncate(limit);
            print_entries(&entries, "", json)?;
        }

        KnowledgeAction::Remove { entry_id, force } => {
            let entry = resolve_entry(&store, &entry_id)?;
            if !force {
                println!(
                    "About to delete: {} - {}",
                    entry.entry_type.to_string().cyan(),
                    entry.title.bold()
                );
                let preview: String = entry.content.chars().take(100).collect();
                println!("Content preview: {}", preview);
                println!();
                println!("Use --force to confirm deletion");
                return Ok(());
            }
            store.delete_entry(&entry.id)?;
            println!("{} Removed: {}", "✓".green(), entry.title);
        }
    }

    Ok(())
}

fn print_entries(entries: &[KnowledgeEntry], qualifier: &str, json: bool) -> Result<()> {
    if json {
        return output::print_json(entries);
    }
    let qualifier = if qualifier.is_empty() {
        String::new()
    } else {
        format!(" {}", qualifier)
    };
    if entries.is_empty() {
        println!("{} No knowledge found{}", "⚠".yellow(), qualifier);
        return Ok(());
    }
    println!("{} {} knowledge entries{}:", "📚".cyan(), entries.len(), qualifier);
    println!();
    for (i, entry) in entries.iter().enumerate() {
        output::print_knowledge_entry(i + 1, entry);
    }
    Ok(())
}
