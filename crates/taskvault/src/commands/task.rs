//! Task command: create, update and inspect the task tree of a project.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::json;
use taskvault_core::{NewTask, Task, TaskPriority, TaskStatus, TaskStore, TaskUpdate};

use super::{open_manager, resolve_task};
use crate::cli::{TaskAction, TaskCommand};
use crate::config::Config;
use crate::output;

/// Execute task command.
pub fn execute(cmd: TaskCommand, config: &Config, json: bool) -> Result<()> {
    let manager = open_manager(config)?;
    let store = manager.get_task_manager(cmd.project.name()?)?;

    match cmd.action {
        TaskAction::Create {
            title,
            description,
            priority,
            parent,
            agent,
            tags,
            depends_on,
        } => {
            let mut input = NewTask::new(title)
                .description(description)
                .priority(priority.parse::<TaskPriority>()?);
            if let Some(parent) = parent {
                input = input.parent(resolve_task(&store, &parent)?.id);
            }
            if let Some(agent) = agent {
                input = input.agent(agent);
            }
            for tag in tags {
                input = input.tag(tag);
            }
            for dep in depends_on {
                input = input.depends_on(resolve_task(&store, &dep)?.id);
            }
            let task = store.create_task(input)?;
            report(&task, "Created", json)
        }

        TaskAction::Update {
            task_id,
            title,
            description,
            status,
            priority,
            agent,
            unassign,
            add_tags,
            remove_tags,
        } => {
            let id = resolve_task(&store, &task_id)?.id;
            let update = TaskUpdate {
                title,
                description,
                status: status.map(|s| s.parse::<TaskStatus>()).transpose()?,
                priority: priority.map(|p| p.parse::<TaskPriority>()).transpose()?,
                assigned_agent: if unassign { Some(None) } else { agent.map(Some) },
                tags: None,
                add_tags,
                remove_tags,
            };
            if update.is_empty() {
                println!("{} No changes to apply", "⚠".yellow());
                return Ok(());
            }
            let task = store.update_task(&id, update)?;
            report(&task, "Updated", json)
        }

        TaskAction::Start { task_id } => {
            let id = resolve_task(&store, &task_id)?.id;
            if !store.can_start(&id)? {
                let waiting: Vec<String> = store
                    .dependencies_of(&id)?
                    .into_iter()
                    .filter(|d| d.status != TaskStatus::Completed)
                    .map(|d| d.title)
                    .collect();
                println!(
                    "{} Starting with unfinished dependencies: {}",
                    "⚠".yellow(),
                    waiting.join(", ")
                );
            }
            let task = store.mark_task_in_progress(&id)?;
            report(&task, "Started", json)
        }

        TaskAction::Done { task_id } => {
            let id = resolve_task(&store, &task_id)?.id;
            let task = store.mark_task_completed(&id)?;
            report(&task, "Completed", json)
        }

        TaskAction::Move { task_id, parent } => {
            let id = resolve_task(&store, &task_id)?.id;
            let parent_id = parent
                .map(|p| resolve_task(&store, &p).map(|t| t.id))
                .transpose()?;
            let task = store.move_task(&id, parent_id.as_deref())?;
            report(&task, "Moved", json)
        }

        TaskAction::Delete { task_id, force } => {
            let task = resolve_task(&store, &task_id)?;
            if !force {
                let subtree = store.snapshot()?.subtree_ids(&task.id).len();
                println!("About to delete: {}", output::task_line(&task));
                println!("This removes {} task(s) and their folders.", subtree);
                println!();
                println!("Use --force to confirm deletion");
                return Ok(());
            }
            let removed = store.delete_task(&task.id)?;
            if json {
                return output::print_json(&json!({ "removed": removed }));
            }
            println!("{} Deleted {} task(s)", "✓".green(), removed.len());
            Ok(())
        }

        TaskAction::List {
            status,
            agent,
            tag,
            ready,
            blocked,
        } => {
            let mut tasks = if ready {
                store.get_ready_tasks()?
            } else if blocked {
                store.get_blocked_tasks()?
            } else {
                store.get_all_tasks()?
            };
            if let Some(status) = status {
                let status: TaskStatus = status.parse()?;
                tasks.retain(|t| t.status == status);
            }
            if let Some(agent) = agent {
                tasks.retain(|t| t.assigned_agent.as_deref() == Some(agent.as_str()));
            }
            if let Some(tag) = tag {
                tasks.retain(|t| t.tags.contains(&tag));
            }

            if json {
                return output::print_json(&tasks);
            }
            if tasks.is_empty() {
                println!("{} No tasks found", "⚠".yellow());
                return Ok(());
            }
            println!("{} {} tasks:", "📋".cyan(), tasks.len());
            output::print_task_list(&tasks);
            Ok(())
        }

        TaskAction::Tree => {
            let tree = store.get_task_tree()?;
            if json {
                return output::print_json(&tree);
            }
            if tree.is_empty() {
                println!("{} No tasks yet", "⚠".yellow());
                return Ok(());
            }
            for line in output::render_tree(&tree) {
                println!("{}", line);
            }
            println!();
            println!("{}", output::summary_line(&store.get_summary()?));
            Ok(())
        }

        TaskAction::Show { task_id } => {
            let task = resolve_task(&store, &task_id)?;
            show(&store, &task, json)
        }

        TaskAction::Notes {
            task_id,
            set,
            from_file,
        } => {
            let id = resolve_task(&store, &task_id)?.id;
            let text = match (set, from_file) {
                (Some(text), _) => Some(text),
                (None, Some(path)) => Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read file: {}", path.display()))?,
                ),
                (None, None) => None,
            };
            match text {
                Some(text) => {
                    store.update_task_notes(&id, &text)?;
                    println!("{} Notes updated", "✓".green());
                }
                None => print!("{}", store.get_task_notes(&id)?),
            }
            Ok(())
        }

        TaskAction::Attach {
            task_id,
            path,
            name,
            remove,
        } => {
            let id = resolve_task(&store, &task_id)?.id;
            if let Some(name) = remove {
                store.delete_task_file(&id, &name)?;
                println!("{} Removed attachment {}", "✓".green(), name);
                return Ok(());
            }
            if let Some(path) = path {
                let name = match name {
                    Some(name) => name,
                    None => file_name(&path)?,
                };
                let bytes = fs::read(&path)
                    .with_context(|| format!("Failed to read file: {}", path.display()))?;
                store.put_task_file(&id, &name, &bytes)?;
                println!("{} Attached {} ({} bytes)", "✓".green(), name.bold(), bytes.len());
                return Ok(());
            }

            let files = store.list_task_files(&id)?;
            if json {
                return output::print_json(&files);
            }
            if files.is_empty() {
                println!("{} No attachments", "⚠".yellow());
            }
            for file in files {
                println!("  {} {}", file.name, format!("{} bytes", file.size).dimmed());
            }
            Ok(())
        }

        TaskAction::Deps {
            task_id,
            add,
            remove,
        } => {
            let id = resolve_task(&store, &task_id)?.id;
            if let Some(dep) = add {
                let dep = resolve_task(&store, &dep)?;
                store.add_dependency(&id, &dep.id)?;
                println!("{} Now depends on {}", "✓".green(), dep.title.bold());
            }
            if let Some(dep) = remove {
                let dep = resolve_task(&store, &dep)?;
                store.remove_dependency(&id, &dep.id)?;
                println!("{} No longer depends on {}", "✓".green(), dep.title.bold());
            }

            let dependencies = store.dependencies_of(&id)?;
            let dependents = store.dependents_of(&id)?;
            let can_start = store.can_start(&id)?;
            if json {
                return output::print_json(&json!({
                    "dependencies": dependencies,
                    "dependents": dependents,
                    "can_start": can_start,
                }));
            }
            println!("{}", "Depends on:".dimmed());
            output::print_task_list(&dependencies);
            println!("{}", "Needed by:".dimmed());
            output::print_task_list(&dependents);
            if can_start {
                println!("{} Ready to start", "✓".green());
            } else {
                println!("{} Waiting on dependencies", "⚠".yellow());
            }
            Ok(())
        }

        TaskAction::Rebuild => {
            let count = store.rebuild_views()?;
            println!("{} Rebuilt {} project view(s)", "✓".green(), count);
            Ok(())
        }
    }
}

fn report(task: &Task, verb: &str, json: bool) -> Result<()> {
    if json {
        return output::print_json(task);
    }
    println!("{} {} {}", "✓".green(), verb, output::task_line(task));
    Ok(())
}

fn show(store: &TaskStore, task: &Task, json: bool) -> Result<()> {
    let children = store.get_children(&task.id)?;
    let files = store.list_task_files(&task.id)?;
    let notes = store.get_task_notes(&task.id)?;
    if json {
        return output::print_json(&json!({
            "task": task,
            "children": children,
            "files": files,
            "notes": notes,
            "folder": store.task_folder(&task.id)?,
        }));
    }

    println!("{} {}", output::status_icon(task.status), task.title.bold());
    println!();
    println!("  ID: {}", task.id);
    println!("  Status: {}", task.status);
    println!("  Priority: {}", output::priority_label(task.priority));
    if let Some(agent) = &task.assigned_agent {
        println!("  Agent: {}", agent.cyan());
    }
    if let Some(parent) = &task.parent_id {
        println!("  Parent: {}", parent.dimmed());
    }
    if !task.tags.is_empty() {
        let tags: Vec<&str> = task.tags.iter().map(String::as_str).collect();
        println!("  Tags: {}", tags.join(", ").dimmed());
    }
    println!("  Folder: {}", store.task_folder(&task.id)?.display().to_string().dimmed());
    println!(
        "  Created: {}",
        task.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
    );

    if !task.description.is_empty() {
        println!();
        println!("{}", task.description);
    }
    if !children.is_empty() {
        println!();
        println!("{}", "Subtasks:".dimmed());
        output::print_task_list(&children);
    }
    if !files.is_empty() {
        println!();
        println!("{}", "Files:".dimmed());
        for file in &files {
            println!("  {} {}", file.name, format!("{} bytes", file.size).dimmed());
        }
    }
    if !notes.trim().is_empty() {
        println!();
        println!("{}", "Notes:".dimmed());
        println!("{}", notes.trim_end());
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => bail!("Cannot derive an attachment name from {}", path.display()),
    }
}
