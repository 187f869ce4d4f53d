//! Command implementations for the tv CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod import;
pub mod knowledge;
pub mod project;
pub mod task;

use anyhow::{bail, Context, Result};
use taskvault_core::{KnowledgeEntry, KnowledgeStore, ProjectManager, Task, TaskStore};

use crate::config::Config;

/// Open the projects directory named by the configuration.
pub fn open_manager(config: &Config) -> Result<ProjectManager> {
    ProjectManager::new(&config.paths.projects_dir, config.store.clone()).with_context(|| {
        format!(
            "Failed to open projects directory: {}",
            config.paths.projects_dir.display()
        )
    })
}

/// Resolve a full task ID or a unique prefix of one.
pub fn resolve_task(store: &TaskStore, id: &str) -> Result<Task> {
    if let Some(task) = store.get_task(id)? {
        return Ok(task);
    }
    let matches: Vec<Task> = store
        .get_all_tasks()?
        .into_iter()
        .filter(|t| t.id.starts_with(id))
        .collect();
    match matches.len() {
        0 => bail!("Task not found: {}", id),
        1 => Ok(matches.into_iter().next().context("Task not found")?),
        n => bail!("Task ID prefix '{}' is ambiguous ({} matches)", id, n),
    }
}

/// Resolve a full knowledge entry ID or a unique prefix of one.
pub fn resolve_entry(store: &KnowledgeStore, id: &str) -> Result<KnowledgeEntry> {
    let matches: Vec<KnowledgeEntry> = store
        .all_entries()?
        .into_iter()
        .filter(|e| e.id.starts_with(id))
        .collect();
    if let Some(exact) = matches.iter().find(|e| e.id == id) {
        return Ok(exact.clone());
    }
    match matches.len() {
        0 => bail!("Knowledge entry not found: {}", id),
        1 => Ok(matches.into_iter().next().context("Knowledge entry not found")?),
        n => bail!("Knowledge ID prefix '{}' is ambiguous ({} matches)", id, n),
    }
}
