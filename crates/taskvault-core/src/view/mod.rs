//! Project views: the derived `project_data.json` document.
//!
//! A view is rebuilt from the in-memory task map for one root task and holds
//! a status summary plus the full nested tree below that root. Views are never
//! authoritative; deleting one loses nothing because `task.json` records are the
//! source of truth.

mod index;

pub use index::TaskIndex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Task, TaskStatus};

/// Format version written into every view document.
pub const VIEW_VERSION: &str = "1.0";

/// Status counts over a set of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSummary {
    pub total_tasks: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl ViewSummary {
    pub fn add(&mut self, status: TaskStatus) {
        self.total_tasks += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
        }
    }

    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut summary = Self::default();
        for task in tasks {
            summary.add(task.status);
        }
        summary
    }

    /// Percentage of completed tasks, 0 for an empty set.
    pub fn completion_percent(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.completed as f64 * 100.0 / self.total_tasks as f64
        }
    }
}

/// A task with its children, recursively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default)]
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    /// Number of tasks in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TaskNode::count).sum::<usize>()
    }

    /// Visit every task in the subtree, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Task, usize)) {
        self.walk_at(visit, 0);
    }

    fn walk_at<'a>(&'a self, visit: &mut impl FnMut(&'a Task, usize), level: usize) {
        visit(&self.task, level);
        for child in &self.children {
            child.walk_at(visit, level + 1);
        }
    }

    pub fn summary(&self) -> ViewSummary {
        let mut summary = ViewSummary::default();
        self.walk(&mut |task, _| summary.add(task.status));
        summary
    }
}

/// The aggregated document written at each root task's folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectView {
    pub version: String,
    pub project_id: String,
    pub project_title: String,
    pub summary: ViewSummary,
    pub task_tree: TaskNode,
}

/// Build the nested tree rooted at `id`.
pub fn build_tree(index: &TaskIndex, id: &str) -> Option<TaskNode> {
    let task = index.get(id)?.clone();
    let children = index
        .children(id)
        .iter()
        .filter_map(|child| build_tree(index, child))
        .collect();
    Some(TaskNode { task, children })
}

/// Build the trees of every root task.
pub fn build_forest(index: &TaskIndex) -> Vec<TaskNode> {
    index
        .roots()
        .iter()
        .filter_map(|root| build_tree(index, root))
        .collect()
}

/// Build the view document for the root task `root_id`.
pub fn build_view(
    index: &TaskIndex,
    root_id: &str,
    project_id: &str,
    project_title: &str,
) -> Result<ProjectView> {
    let task_tree = build_tree(index, root_id).ok_or_else(|| Error::task_not_found(root_id))?;
    Ok(ProjectView {
        version: VIEW_VERSION.to_string(),
        project_id: project_id.to_string(),
        project_title: project_title.to_string(),
        summary: task_tree.summary(),
        task_tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskPriority;
    use std::path::PathBuf;

    fn sample_index() -> (TaskIndex, Vec<Task>) {
        let mut index = TaskIndex::new();
        let root = Task::new("Build X", "", TaskPriority::High);
        let mut design = Task::new("Design", "", TaskPriority::Medium);
        design.parent_id = Some(root.id.clone());
        design.status = TaskStatus::InProgress;
        let mut schema = Task::new("Schema", "", TaskPriority::Medium);
        schema.parent_id = Some(design.id.clone());
        schema.status = TaskStatus::Completed;
        let other_root = Task::new("Other", "", TaskPriority::Low);

        for t in [&root, &design, &schema, &other_root] {
            index.insert(t.clone(), PathBuf::from(&t.title));
        }
        (index, vec![root, design, schema, other_root])
    }

    #[test]
    fn test_build_view_summary_partitions_subtree() {
        let (index, tasks) = sample_index();
        let view = build_view(&index, &tasks[0].id, "proj", "Project").unwrap();

        assert_eq!(view.version, VIEW_VERSION);
        assert_eq!(view.summary.total_tasks, 3);
        assert_eq!(view.summary.pending, 1);
        assert_eq!(view.summary.in_progress, 1);
        assert_eq!(view.summary.completed, 1);
        assert_eq!(
            view.summary.pending + view.summary.in_progress + view.summary.completed,
            view.task_tree.count()
        );
    }

    #[test]
    fn test_build_tree_nesting() {
        let (index, tasks) = sample_index();
        let tree = build_tree(&index, &tasks[0].id).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].task.title, "Design");
        assert_eq!(tree.children[0].children.len(), 1);
        assert_eq!(tree.children[0].children[0].task.title, "Schema");
        assert!(tree.children[0].children[0].children.is_empty());
    }

    #[test]
    fn test_build_forest_has_every_root() {
        let (index, _) = sample_index();
        let forest = build_forest(&index);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.iter().map(TaskNode::count).sum::<usize>(), 4);
    }

    #[test]
    fn test_view_json_shape() {
        let (index, tasks) = sample_index();
        let view = build_view(&index, &tasks[0].id, "proj", "Project").unwrap();
        let value = serde_json::to_value(&view).unwrap();

        assert_eq!(value["summary"]["total_tasks"], 3);
        assert_eq!(value["task_tree"]["title"], "Build X");
        assert_eq!(value["task_tree"]["children"][0]["status"], "in_progress");

        let back: ProjectView = serde_json::from_value(value).unwrap();
        assert_eq!(back, view);
    }

    #[test]
    fn test_build_view_missing_root() {
        let (index, _) = sample_index();
        assert!(build_view(&index, "nope", "p", "P").unwrap_err().is_not_found());
    }

    #[test]
    fn test_completion_percent() {
        let summary = ViewSummary {
            total_tasks: 4,
            pending: 2,
            in_progress: 1,
            completed: 1,
        };
        assert_eq!(summary.completion_percent(), 25.0);
        assert_eq!(ViewSummary::default().completion_percent(), 0.0);
    }
}
