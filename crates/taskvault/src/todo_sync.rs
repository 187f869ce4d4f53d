//! Todo list synchronization.
//!
//! Maps an ordered agent todo list (`[{content, status}]`) onto a project's
//! task tree. Items are matched to existing tasks by title. An item that is
//! in progress or completed opens a group: it stays at the top level and the
//! pending items that follow it become its children, until the next active
//! item opens a new group.
//!
//! Syncing is split into [`plan`], which only reads, and [`apply`], which
//! performs the planned writes; a dry run stops after planning.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use taskvault_core::{NewTask, Task, TaskStatus, TaskStore, TaskUpdate};
use tracing::{debug, info};

/// One todo item as written by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: TaskStatus,
}

/// Accepts either a bare array or `{"todos": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TodoFile {
    List(Vec<TodoItem>),
    Wrapped { todos: Vec<TodoItem> },
}

/// Parse a todo list file.
pub fn read_todos(path: &Path) -> Result<Vec<TodoItem>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read todo file: {}", path.display()))?;
    parse_todos(&content).with_context(|| format!("Failed to parse todo file: {}", path.display()))
}

pub fn parse_todos(content: &str) -> Result<Vec<TodoItem>> {
    let items = match serde_json::from_str::<TodoFile>(content)? {
        TodoFile::List(items) => items,
        TodoFile::Wrapped { todos } => todos,
    };
    Ok(items
        .into_iter()
        .filter(|item| !item.content.trim().is_empty())
        .collect())
}

/// Parent of a planned task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRef {
    /// An existing task.
    Existing(String),
    /// A task created earlier in the same plan, by position.
    Planned(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    Create {
        title: String,
        status: TaskStatus,
        parent: Option<ParentRef>,
    },
    UpdateStatus {
        task_id: String,
        title: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    Unchanged {
        task_id: String,
        title: String,
    },
    /// A later item repeating the title of a task created earlier in the plan.
    Repeat {
        title: String,
        of: usize,
    },
}

/// Work out the writes needed to bring `existing` in line with `todos`.
///
/// The returned actions are positionally aligned with `todos`.
pub fn plan(todos: &[TodoItem], existing: &[Task]) -> Vec<SyncAction> {
    let mut by_title: HashMap<&str, &Task> = HashMap::new();
    for task in existing {
        // Oldest task wins when titles repeat
        by_title.entry(task.title.trim()).or_insert(task);
    }

    let mut planned: HashMap<&str, usize> = HashMap::new();
    let mut actions = Vec::with_capacity(todos.len());
    let mut group: Option<ParentRef> = None;
    for (position, item) in todos.iter().enumerate() {
        let title = item.content.trim();
        let opens_group = item.status != TaskStatus::Pending;

        let action = match by_title.get(title) {
            Some(task) if task.status == item.status => SyncAction::Unchanged {
                task_id: task.id.clone(),
                title: title.to_string(),
            },
            Some(task) => SyncAction::UpdateStatus {
                task_id: task.id.clone(),
                title: title.to_string(),
                from: task.status,
                to: item.status,
            },
            None => match planned.get(title) {
                // First occurrence wins
                Some(&of) => SyncAction::Repeat {
                    title: title.to_string(),
                    of,
                },
                None => {
                    planned.insert(title, position);
                    SyncAction::Create {
                        title: title.to_string(),
                        status: item.status,
                        parent: if opens_group { None } else { group.clone() },
                    }
                }
            },
        };

        if opens_group {
            group = Some(match &action {
                SyncAction::Create { .. } => ParentRef::Planned(position),
                SyncAction::Repeat { of, .. } => ParentRef::Planned(*of),
                SyncAction::UpdateStatus { task_id, .. } | SyncAction::Unchanged { task_id, .. } => {
                    ParentRef::Existing(task_id.clone())
                }
            });
        }
        actions.push(action);
    }
    actions
}

/// Counts of what a sync did (or would do).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl SyncReport {
    pub fn from_plan(actions: &[SyncAction]) -> Self {
        let mut report = Self::default();
        for action in actions {
            match action {
                SyncAction::Create { .. } => report.created += 1,
                SyncAction::UpdateStatus { .. } => report.updated += 1,
                SyncAction::Unchanged { .. } | SyncAction::Repeat { .. } => report.unchanged += 1,
            }
        }
        report
    }
}

/// Perform a plan against the store.
pub fn apply(store: &TaskStore, actions: &[SyncAction]) -> Result<SyncReport> {
    let mut created_ids: HashMap<usize, String> = HashMap::new();
    let mut report = SyncReport::default();

    for (position, action) in actions.iter().enumerate() {
        match action {
            SyncAction::Create {
                title,
                status,
                parent,
            } => {
                let mut input = NewTask::new(title.clone());
                match parent {
                    Some(ParentRef::Existing(id)) => input = input.parent(id.clone()),
                    Some(ParentRef::Planned(index)) => {
                        let id = created_ids
                            .get(index)
                            .with_context(|| format!("Planned parent #{} was not created", index))?;
                        input = input.parent(id.clone());
                    }
                    None => {}
                }
                let task = store
                    .create_task(input)
                    .with_context(|| format!("Failed to create task '{}'", title))?;
                if *status != TaskStatus::Pending {
                    store.set_task_status(&task.id, *status)?;
                }
                debug!(task_id = %task.id, title = %title, "created task from todo");
                created_ids.insert(position, task.id);
                report.created += 1;
            }
            SyncAction::UpdateStatus { task_id, to, .. } => {
                store
                    .update_task(task_id, TaskUpdate::status(*to))
                    .with_context(|| format!("Failed to update task {}", task_id))?;
                report.updated += 1;
            }
            SyncAction::Unchanged { .. } | SyncAction::Repeat { .. } => report.unchanged += 1,
        }
    }

    info!(
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        "synced todo list"
    );
    Ok(report)
}

/// Copy a project directory to `<backups_dir>/<name>-<timestamp>` before a sync.
pub fn backup_project(project_dir: &Path, backups_dir: &Path) -> Result<PathBuf> {
    let name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let target = backups_dir.join(format!("{}-{}", name, stamp));

    copy_dir(project_dir, &target)
        .with_context(|| format!("Failed to back up {} to {}", project_dir.display(), target.display()))?;
    info!(from = %project_dir.display(), to = %target.display(), "backed up project");
    Ok(target)
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(".taskvault.lock") {
            continue;
        }
        let dest = to.join(&name);
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskvault_core::{StoreConfig, TaskPriority};
    use tempfile::tempdir;

    fn item(content: &str, status: TaskStatus) -> TodoItem {
        TodoItem {
            content: content.to_string(),
            status,
        }
    }

    fn open_store(dir: &Path) -> TaskStore {
        let config = StoreConfig {
            fsync: false,
            ..Default::default()
        };
        TaskStore::open(dir, "demo", "Demo", config).unwrap()
    }

    #[test]
    fn test_parse_both_shapes() {
        let bare = r#"[{"content": "a", "status": "in_progress"}, {"content": "b"}]"#;
        let items = parse_todos(bare).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].status, TaskStatus::InProgress);
        assert_eq!(items[1].status, TaskStatus::Pending);

        let wrapped = r#"{"todos": [{"content": "a", "status": "completed"}, {"content": "  "}]}"#;
        let items = parse_todos(wrapped).unwrap();
        assert_eq!(items, vec![item("a", TaskStatus::Completed)]);

        assert!(parse_todos(r#"{"items": []}"#).is_err());
    }

    #[test]
    fn test_plan_groups_pending_under_active_items() {
        let todos = vec![
            item("Setup", TaskStatus::Pending),
            item("Design", TaskStatus::InProgress),
            item("Schema", TaskStatus::Pending),
            item("API", TaskStatus::Pending),
            item("Ship", TaskStatus::Completed),
            item("Announce", TaskStatus::Pending),
        ];
        let actions = plan(&todos, &[]);

        let parents: Vec<Option<ParentRef>> = actions
            .iter()
            .map(|a| match a {
                SyncAction::Create { parent, .. } => parent.clone(),
                other => panic!("unexpected action {:?}", other),
            })
            .collect();
        assert_eq!(
            parents,
            vec![
                None,
                None,
                Some(ParentRef::Planned(1)),
                Some(ParentRef::Planned(1)),
                None,
                Some(ParentRef::Planned(4)),
            ]
        );
        assert_eq!(SyncReport::from_plan(&actions).created, 6);
    }

    #[test]
    fn test_repeated_new_title_is_created_once() {
        let todos = vec![
            item("Deploy", TaskStatus::InProgress),
            item("Smoke test", TaskStatus::Pending),
            item("Deploy", TaskStatus::InProgress),
            item("Rollback plan", TaskStatus::Pending),
        ];
        let actions = plan(&todos, &[]);
        assert_eq!(
            actions[2],
            SyncAction::Repeat {
                title: "Deploy".into(),
                of: 0
            }
        );
        assert_eq!(
            SyncReport::from_plan(&actions),
            SyncReport {
                created: 3,
                updated: 0,
                unchanged: 1
            }
        );

        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        apply(&store, &actions).unwrap();
        assert_eq!(store.task_count().unwrap(), 3);
        let tree = store.get_task_tree().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].task.title, "Deploy");
        assert_eq!(tree[0].children.len(), 2);
    }

    #[test]
    fn test_plan_matches_existing_titles() {
        let mut design = Task::new("Design", "", TaskPriority::Medium);
        design.status = TaskStatus::InProgress;
        let schema = Task::new("Schema", "", TaskPriority::Medium);

        let todos = vec![
            item("Design", TaskStatus::InProgress),
            item("Schema", TaskStatus::Completed),
            item("API", TaskStatus::Pending),
        ];
        let actions = plan(&todos, &[design.clone(), schema.clone()]);

        assert_eq!(
            actions[0],
            SyncAction::Unchanged {
                task_id: design.id.clone(),
                title: "Design".into()
            }
        );
        assert_eq!(
            actions[1],
            SyncAction::UpdateStatus {
                task_id: schema.id.clone(),
                title: "Schema".into(),
                from: TaskStatus::Pending,
                to: TaskStatus::Completed,
            }
        );
        // The updated Schema item is active, so it opens the group for API
        assert_eq!(
            actions[2],
            SyncAction::Create {
                title: "API".into(),
                status: TaskStatus::Pending,
                parent: Some(ParentRef::Existing(schema.id.clone())),
            }
        );
    }

    #[test]
    fn test_apply_builds_tree_and_is_repeatable() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let todos = vec![
            item("Design", TaskStatus::InProgress),
            item("Schema", TaskStatus::Pending),
            item("API", TaskStatus::Pending),
        ];

        let report = apply(&store, &plan(&todos, &store.get_all_tasks().unwrap())).unwrap();
        assert_eq!(report.created, 3);

        let tree = store.get_task_tree().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].task.title, "Design");
        assert_eq!(tree[0].task.status, TaskStatus::InProgress);
        assert_eq!(tree[0].children.len(), 2);

        // Second sync with progress: only status changes
        let todos = vec![
            item("Design", TaskStatus::Completed),
            item("Schema", TaskStatus::Completed),
            item("API", TaskStatus::Pending),
        ];
        let report = apply(&store, &plan(&todos, &store.get_all_tasks().unwrap())).unwrap();
        assert_eq!(
            report,
            SyncReport {
                created: 0,
                updated: 2,
                unchanged: 1
            }
        );
        assert_eq!(store.task_count().unwrap(), 3);

        let view = store.read_project_view(&tree[0].task.id).unwrap();
        assert_eq!(view.summary.total_tasks, 3);
        assert_eq!(view.summary.completed, 2);
        assert_eq!(view.summary.pending, 1);
    }

    #[test]
    fn test_dry_run_plan_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let todos = vec![item("Design", TaskStatus::InProgress)];

        let actions = plan(&todos, &store.get_all_tasks().unwrap());
        assert_eq!(actions.len(), 1);
        assert_eq!(store.task_count().unwrap(), 0);
        assert_eq!(fs::read_dir(dir.path().join("tasks")).unwrap().count(), 0);
    }

    #[test]
    fn test_backup_copies_project() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("demo");
        let store = open_store(&project);
        let task = store.create_task(NewTask::new("Design")).unwrap();
        store.update_task_notes(&task.id, "keep me").unwrap();

        let target = backup_project(&project, &dir.path().join(".backups")).unwrap();
        let copied_folder = target.join(
            store
                .task_folder(&task.id)
                .unwrap()
                .strip_prefix(&project)
                .unwrap(),
        );
        assert_eq!(fs::read_to_string(copied_folder.join("notes.md")).unwrap(), "keep me");
        assert!(!target.join(".taskvault.lock").exists());
    }
}
