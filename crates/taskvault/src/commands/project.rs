//! Project command: create, list and inspect projects.

use anyhow::Result;
use colored::Colorize;
use taskvault_core::ProjectStatus;

use super::open_manager;
use crate::cli::{ProjectAction, ProjectCommand};
use crate::config::Config;
use crate::output;

/// Execute project command.
pub fn execute(cmd: ProjectCommand, config: &Config, json: bool) -> Result<()> {
    let manager = open_manager(config)?;

    match cmd.action {
        ProjectAction::Create { name } => {
            let existed = manager.project_exists(&name);
            let path = manager.create_project(&name)?;
            if json {
                return output::print_json(&manager.get_project(&name)?);
            }
            if existed {
                println!("{} Project already exists: {}", "⚠".yellow(), path.display());
            } else {
                println!("{} Created project {}", "✓".green(), name.bold());
                println!("  Path: {}", path.display().to_string().dimmed());
            }
        }

        ProjectAction::List => {
            let projects = manager.list_projects()?;
            if json {
                return output::print_json(&projects);
            }
            if projects.is_empty() {
                println!("{} No projects in {}", "⚠".yellow(), manager.root().display());
                return Ok(());
            }
            for project in projects {
                let summary = manager.get_task_manager(&project.slug)?.get_summary()?;
                println!(
                    "  {} {} {}",
                    project.name.bold(),
                    format!("[{}]", project.status).dimmed(),
                    output::summary_line(&summary)
                );
            }
        }

        ProjectAction::Show { name } => {
            let context = manager.get_project_context(&name)?;
            if json {
                return output::print_json(&context);
            }
            println!("{} {}", context.project.name.bold(), format!("[{}]", context.project.status).dimmed());
            println!("  {}", output::summary_line(&context.summary));
            println!("  Path: {}", context.project.path.display().to_string().dimmed());

            if !context.in_progress.is_empty() {
                println!();
                println!("{}", "In progress:".yellow());
                output::print_task_list(&context.in_progress);
            }
            if !context.pending.is_empty() {
                println!();
                println!("{}", "Pending:".normal());
                output::print_task_list(&context.pending);
            }
            if !context.recent_knowledge.is_empty() {
                println!();
                println!("{}", "Recent knowledge:".cyan());
                for (i, entry) in context.recent_knowledge.iter().enumerate() {
                    output::print_knowledge_entry(i + 1, entry);
                }
            }
        }

        ProjectAction::Status { name, status } => {
            let status: ProjectStatus = status.parse()?;
            let project = manager.set_project_status(&name, status)?;
            if json {
                return output::print_json(&project);
            }
            println!("{} {} is now {}", "✓".green(), project.name.bold(), project.status);
        }
    }

    Ok(())
}
