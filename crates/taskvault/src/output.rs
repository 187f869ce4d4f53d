//! Terminal rendering for tasks, trees and knowledge entries.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use taskvault_core::{KnowledgeEntry, Task, TaskNode, TaskPriority, TaskStatus, ViewSummary};

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn status_icon(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Pending => "○".normal(),
        TaskStatus::InProgress => "◐".yellow(),
        TaskStatus::Completed => "●".green(),
    }
}

pub fn priority_label(priority: TaskPriority) -> ColoredString {
    match priority {
        TaskPriority::Low => "low".dimmed(),
        TaskPriority::Medium => "medium".normal(),
        TaskPriority::High => "high".yellow(),
        TaskPriority::Critical => "critical".red().bold(),
    }
}

/// One-line task summary: icon, short id, title, agent and tags.
pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{} {} {}",
        status_icon(task.status),
        task.short_id().dimmed(),
        task.title
    );
    if matches!(task.priority, TaskPriority::High | TaskPriority::Critical) {
        line.push_str(&format!(" [{}]", priority_label(task.priority)));
    }
    if let Some(agent) = &task.assigned_agent {
        line.push_str(&format!(" @{}", agent.cyan()));
    }
    if !task.tags.is_empty() {
        let tags: Vec<&str> = task.tags.iter().map(String::as_str).collect();
        line.push_str(&format!(" {}", tags.join(", ").dimmed()));
    }
    line
}

pub fn print_task_list(tasks: &[Task]) {
    for task in tasks {
        println!("  {}", task_line(task));
    }
}

/// Render a forest as indented text with box-drawing connectors.
pub fn render_tree(nodes: &[TaskNode]) -> Vec<String> {
    let mut lines = Vec::new();
    for node in nodes {
        lines.push(task_line(&node.task));
        render_children(&node.children, "", &mut lines);
    }
    lines
}

fn render_children(children: &[TaskNode], prefix: &str, lines: &mut Vec<String>) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let connector = if last { "└── " } else { "├── " };
        lines.push(format!("{}{}{}", prefix, connector, task_line(&child.task)));
        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(&child.children, &next, lines);
    }
}

pub fn summary_line(summary: &ViewSummary) -> String {
    format!(
        "{} tasks: {} pending, {} in progress, {} completed ({:.0}%)",
        summary.total_tasks,
        summary.pending,
        summary.in_progress.to_string().yellow(),
        summary.completed.to_string().green(),
        summary.completion_percent()
    )
}

pub fn print_knowledge_entry(index: usize, entry: &KnowledgeEntry) {
    println!(
        "{}. {} {} {}",
        index,
        entry.entry_type.to_string().cyan(),
        entry.title.bold(),
        entry.id.get(..8).unwrap_or(&entry.id).dimmed()
    );
    let preview: String = entry.content.chars().take(100).collect();
    if !preview.is_empty() {
        println!("   {}", preview);
    }
    if !entry.tags.is_empty() {
        let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
        println!("   Tags: {}", tags.join(", ").dimmed());
    }
    println!();
}
