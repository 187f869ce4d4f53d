//! Per-project task store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         TaskStore                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐  │
//! │  │  mutations   │──▶│ TaskFolders  │──▶│   view rebuild    │  │
//! │  │ (serialized) │   │ (task.json)  │   │ project_data.json │  │
//! │  └──────────────┘   └──────────────┘   └───────────────────┘  │
//! │          │                                      │             │
//! │          └──────── publish snapshot ◀───────────┘             │
//! │                    RwLock<Arc<TaskIndex>>                     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Readers clone the current `Arc<TaskIndex>` and never see a half-applied
//! mutation. Writers work on a staged copy and publish it only after the
//! record and the affected view document are on disk.
//!
//! ## Usage
//!
//! ```ignore
//! use taskvault_core::{NewTask, TaskStore, StoreConfig};
//!
//! let store = TaskStore::open(project_dir, "my-project", "My Project", StoreConfig::default())?;
//! let root = store.create_task(NewTask::new("Build X"))?;
//! let child = store.create_task(NewTask::new("Design").parent(&root.id))?;
//! store.mark_task_completed(&child.id)?;
//! ```

mod store;

pub use store::*;

use std::collections::BTreeSet;

use crate::types::{TaskPriority, TaskStatus};

/// Input for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub parent_id: Option<String>,
    pub assigned_agent: Option<String>,
    pub tags: Vec<String>,
    /// Tasks the new task depends on; each must exist.
    pub dependency_ids: Vec<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.assigned_agent = Some(agent.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.dependency_ids.push(task_id.into());
        self
    }
}

/// Field updates for an existing task. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// `Some(None)` clears the assignment.
    pub assigned_agent: Option<Option<String>>,
    /// Replaces the whole tag set.
    pub tags: Option<BTreeSet<String>>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assigned_agent.is_none()
            && self.tags.is_none()
            && self.add_tags.is_empty()
            && self.remove_tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_builder() {
        let input = NewTask::new("Design")
            .description("API surface")
            .priority(TaskPriority::High)
            .parent("root-id")
            .agent("claude")
            .tag("api")
            .depends_on("other");
        assert_eq!(input.title, "Design");
        assert_eq!(input.parent_id.as_deref(), Some("root-id"));
        assert_eq!(input.tags, vec!["api".to_string()]);
        assert_eq!(input.dependency_ids, vec!["other".to_string()]);
    }

    #[test]
    fn test_task_update_is_empty() {
        assert!(TaskUpdate::default().is_empty());
        assert!(!TaskUpdate::status(TaskStatus::Completed).is_empty());
    }
}
