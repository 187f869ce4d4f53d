//! Task store implementation.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::graph;
use crate::storage::layout::task_folder_name;
use crate::storage::{FileInfo, LoadedTask, ProjectLock, TaskFolders};
use crate::types::{Task, TaskStatus};
use crate::view::{self, ProjectView, TaskIndex, TaskNode, ViewSummary};

use super::{NewTask, TaskUpdate};

/// Task store for one project.
///
/// Owns the in-memory task map and is the only writer of the project's task
/// folders. Hold one instance per project (see `ProjectManager`); a second
/// instance would work from its own, possibly stale, snapshot.
#[derive(Debug)]
pub struct TaskStore {
    project_id: String,
    project_title: String,
    folders: TaskFolders,
    config: StoreConfig,
    state: RwLock<Arc<TaskIndex>>,
    writer: Mutex<()>,
}

/// Held for the duration of one mutation.
struct WriteGuard<'a> {
    _project: ProjectLock,
    _local: MutexGuard<'a, ()>,
}

impl TaskStore {
    /// Open the store for a project directory, loading every task below `<project_dir>/tasks/`.
    pub fn open(
        project_dir: impl Into<PathBuf>,
        project_id: impl Into<String>,
        project_title: impl Into<String>,
        config: StoreConfig,
    ) -> Result<Self> {
        let folders = TaskFolders::new(project_dir, config.fsync);
        fs::create_dir_all(folders.tasks_root())?;
        let index = Self::load_index(&folders, config.max_depth)?;
        let project_id = project_id.into();
        info!(project = %project_id, tasks = index.len(), "loaded task store");

        Ok(Self {
            project_id,
            project_title: project_title.into(),
            folders,
            config,
            state: RwLock::new(Arc::new(index)),
            writer: Mutex::new(()),
        })
    }

    /// Rebuild the task map from folder nesting.
    ///
    /// Folder position is authoritative for the parent relation; a record whose
    /// `parent_id` disagrees is corrected in memory and logged.
    fn load_index(folders: &TaskFolders, max_depth: usize) -> Result<TaskIndex> {
        let mut index = TaskIndex::new();
        let mut skipped: Vec<PathBuf> = Vec::new();
        for loaded in folders.load_all()? {
            let LoadedTask {
                mut task,
                folder,
                folder_parent_id,
                depth,
            } = loaded;

            if skipped.iter().any(|s| folder.starts_with(s)) {
                continue;
            }
            if index.contains(&task.id) {
                warn!(task_id = %task.id, folder = %folder.display(), "duplicate task id, skipping folder");
                skipped.push(folder);
                continue;
            }
            if task.parent_id != folder_parent_id {
                warn!(
                    task_id = %task.id,
                    recorded = ?task.parent_id,
                    folder_parent = ?folder_parent_id,
                    "parent_id disagrees with folder position, using folder position"
                );
                task.parent_id = folder_parent_id;
            }
            if depth > max_depth {
                warn!(task_id = %task.id, depth, max_depth, "task nested deeper than the configured maximum");
            }
            index.insert(task, folder);
        }
        Ok(index)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_title(&self) -> &str {
        &self.project_title
    }

    pub fn project_dir(&self) -> &Path {
        self.folders.project_dir()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The last committed state.
    pub fn snapshot(&self) -> Result<Arc<TaskIndex>> {
        let state = self.state.read().map_err(|_| Error::LockPoisoned)?;
        Ok(Arc::clone(&state))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commit protocol
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_write(&self) -> Result<WriteGuard<'_>> {
        let local = self.writer.lock().map_err(|_| Error::LockPoisoned)?;
        let project = ProjectLock::acquire(self.folders.project_dir(), self.config.file_lock)?;
        Ok(WriteGuard {
            _project: project,
            _local: local,
        })
    }

    /// Write the views of `roots` from `next`, then publish `next`.
    ///
    /// Records are already on disk at this point, so the snapshot is published
    /// even if a view write fails; the error is still returned and the view can
    /// be regenerated with `rebuild_views`.
    fn commit(&self, next: TaskIndex, roots: impl IntoIterator<Item = String>) -> Result<()> {
        let mut seen = HashSet::new();
        let mut first_err = None;
        for root in roots {
            if !seen.insert(root.clone()) {
                continue;
            }
            if let Err(e) = self.write_view(&next, &root) {
                warn!(root = %root, error = %e, "failed to write project view");
                first_err.get_or_insert(e);
            }
        }

        let mut state = self.state.write().map_err(|_| Error::LockPoisoned)?;
        *state = Arc::new(next);
        drop(state);

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_view(&self, index: &TaskIndex, root_id: &str) -> Result<()> {
        let Some(task) = index.get(root_id) else {
            return Ok(());
        };
        if !task.is_root() {
            return Ok(());
        }
        let folder = index
            .folder(root_id)
            .ok_or_else(|| Error::task_not_found(root_id))?;
        let view = view::build_view(index, root_id, &self.project_id, &self.project_title)?;
        self.folders.write_view(folder, &view)?;
        debug!(root = %root_id, total = view.summary.total_tasks, "wrote project view");
        Ok(())
    }

    fn root_or_self(index: &TaskIndex, id: &str) -> String {
        index.root_of(id).unwrap_or_else(|| id.to_string())
    }

    fn folder_in(index: &TaskIndex, id: &str) -> Result<PathBuf> {
        index
            .folder(id)
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::task_not_found(id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a task, write its folder and rebuild its root's view.
    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::invalid("task title must not be empty"));
        }

        let _guard = self.begin_write()?;
        let current = self.snapshot()?;

        let parent_folder = match &input.parent_id {
            Some(parent_id) => {
                if !current.contains(parent_id) {
                    return Err(Error::ParentNotFound(parent_id.clone()));
                }
                let depth = current.depth(parent_id) + 1;
                if depth > self.config.max_depth {
                    return Err(Error::invalid(format!(
                        "task depth {} exceeds maximum of {}",
                        depth, self.config.max_depth
                    )));
                }
                Some(Self::folder_in(&current, parent_id)?)
            }
            None => None,
        };
        if let Some(missing) = input.dependency_ids.iter().find(|d| !current.contains(d)) {
            return Err(Error::task_not_found(missing.clone()));
        }

        let mut task = Task::new(title, input.description, input.priority);
        task.parent_id = input.parent_id;
        task.assigned_agent = input.assigned_agent;
        task.tags = clean_tags(input.tags);
        task.dependency_ids = input.dependency_ids.into_iter().collect();

        let folder = self.folders.folder_for(parent_folder.as_deref(), &task);
        if let Err(e) = self.folders.create_task_folder(&folder, &task) {
            let _ = self.folders.remove_folder(&folder);
            return Err(e);
        }

        let mut next = (*current).clone();
        next.insert(task.clone(), folder);
        let root = Self::root_or_self(&next, &task.id);
        info!(task_id = %task.id, title = %task.title, parent = ?task.parent_id, "created task");

        self.commit(next, [root])?;
        Ok(task)
    }

    /// Apply field updates, rewrite the record and rebuild the root's view.
    ///
    /// A title change renames the task folder to match the new slug.
    pub fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task> {
        let _guard = self.begin_write()?;
        let current = self.snapshot()?;
        let old = current
            .get(id)
            .cloned()
            .ok_or_else(|| Error::task_not_found(id))?;
        let old_folder = Self::folder_in(&current, id)?;

        let mut task = old.clone();
        apply_update(&mut task, update)?;
        if task == old {
            return Ok(task);
        }
        task.touch();

        let new_folder = old_folder.with_file_name(task_folder_name(&task));
        self.folders.move_folder(&old_folder, &new_folder)?;
        if let Err(e) = self.folders.write_task(&new_folder, &task) {
            if new_folder != old_folder {
                let _ = self.folders.move_folder(&new_folder, &old_folder);
            }
            return Err(e);
        }

        let mut next = (*current).clone();
        if new_folder != old_folder {
            next.rebase_folders(&old_folder, &new_folder);
        }
        next.replace(task.clone());
        let root = Self::root_or_self(&next, id);
        debug!(task_id = %id, status = %task.status, "updated task");

        self.commit(next, [root])?;
        Ok(task)
    }

    pub fn set_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        self.update_task(id, TaskUpdate::status(status))
    }

    pub fn mark_task_pending(&self, id: &str) -> Result<Task> {
        self.set_task_status(id, TaskStatus::Pending)
    }

    pub fn mark_task_in_progress(&self, id: &str) -> Result<Task> {
        self.set_task_status(id, TaskStatus::InProgress)
    }

    pub fn mark_task_completed(&self, id: &str) -> Result<Task> {
        self.set_task_status(id, TaskStatus::Completed)
    }

    /// Delete a task and its whole subtree.
    ///
    /// Dependency edges pointing into the removed subtree are dropped from the
    /// remaining tasks. Returns the removed ids.
    pub fn delete_task(&self, id: &str) -> Result<Vec<String>> {
        let _guard = self.begin_write()?;
        let current = self.snapshot()?;
        if !current.contains(id) {
            return Err(Error::task_not_found(id));
        }
        let folder = Self::folder_in(&current, id)?;
        let root = Self::root_or_self(&current, id);
        let removed = current.subtree_ids(id);
        let removed_set: HashSet<&str> = removed.iter().map(String::as_str).collect();

        self.folders.remove_folder(&folder)?;

        let mut next = (*current).clone();
        for rid in removed.iter().rev() {
            next.remove(rid);
        }

        let mut affected_roots = Vec::new();
        if root != id {
            affected_roots.push(root);
        }

        let dependents: Vec<Task> = next
            .tasks()
            .filter(|t| t.dependency_ids.iter().any(|d| removed_set.contains(d.as_str())))
            .cloned()
            .collect();
        let mut first_err = None;
        for mut dependent in dependents {
            dependent
                .dependency_ids
                .retain(|d| !removed_set.contains(d.as_str()));
            dependent.touch();
            let dep_folder = Self::folder_in(&next, &dependent.id)?;
            match self.folders.write_task(&dep_folder, &dependent) {
                Ok(()) => {
                    affected_roots.push(Self::root_or_self(&next, &dependent.id));
                    next.replace(dependent);
                }
                Err(e) => {
                    warn!(task_id = %dependent.id, error = %e, "failed to drop dependency on deleted task");
                    first_err.get_or_insert(e);
                }
            }
        }

        info!(task_id = %id, removed = removed.len(), "deleted task");
        self.commit(next, affected_roots)?;
        match first_err {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Re-parent a task (with its subtree), or make it a root with `None`.
    pub fn move_task(&self, id: &str, new_parent: Option<&str>) -> Result<Task> {
        let _guard = self.begin_write()?;
        let current = self.snapshot()?;
        let old = current
            .get(id)
            .cloned()
            .ok_or_else(|| Error::task_not_found(id))?;
        if old.parent_id.as_deref() == new_parent {
            return Ok(old);
        }
        let old_folder = Self::folder_in(&current, id)?;
        let old_root = Self::root_or_self(&current, id);

        let parent_folder = match new_parent {
            Some(parent_id) => {
                if !current.contains(parent_id) {
                    return Err(Error::ParentNotFound(parent_id.to_string()));
                }
                if parent_id == id || current.ancestors(parent_id).iter().any(|a| a == id) {
                    return Err(Error::invalid(format!(
                        "task {} cannot be moved under its own descendant {}",
                        id, parent_id
                    )));
                }
                let depth = current.depth(parent_id) + current.subtree_height(id);
                if depth > self.config.max_depth {
                    return Err(Error::invalid(format!(
                        "task depth {} exceeds maximum of {}",
                        depth, self.config.max_depth
                    )));
                }
                Some(Self::folder_in(&current, parent_id)?)
            }
            None => None,
        };

        let mut task = old.clone();
        task.parent_id = new_parent.map(String::from);
        task.touch();
        let new_folder = self.folders.folder_for(parent_folder.as_deref(), &task);

        self.folders.move_folder(&old_folder, &new_folder)?;
        if let Err(e) = self.folders.write_task(&new_folder, &task) {
            let _ = self.folders.move_folder(&new_folder, &old_folder);
            return Err(e);
        }
        if old.is_root() {
            if let Err(e) = self.folders.remove_view(&new_folder) {
                warn!(task_id = %id, error = %e, "failed to remove view document of former root");
            }
        }

        let mut next = (*current).clone();
        next.rebase_folders(&old_folder, &new_folder);
        next.reparent(id, task.parent_id.clone(), new_folder);
        next.replace(task.clone());
        let new_root = Self::root_or_self(&next, id);
        info!(task_id = %id, parent = ?task.parent_id, "moved task");

        self.commit(next, [old_root, new_root])?;
        Ok(task)
    }

    /// Record that `task_id` depends on `depends_on`. Adding an existing edge is a no-op.
    pub fn add_dependency(&self, task_id: &str, depends_on: &str) -> Result<Task> {
        let _guard = self.begin_write()?;
        let current = self.snapshot()?;
        graph::validate_dependency(&current, task_id, depends_on)?;

        let mut task = current
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::task_not_found(task_id))?;
        if !task.dependency_ids.insert(depends_on.to_string()) {
            return Ok(task);
        }
        task.touch();
        self.commit_record(&current, task)
    }

    /// Drop the edge `task_id -> depends_on` if present.
    pub fn remove_dependency(&self, task_id: &str, depends_on: &str) -> Result<Task> {
        let _guard = self.begin_write()?;
        let current = self.snapshot()?;
        let mut task = current
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::task_not_found(task_id))?;
        if !task.dependency_ids.remove(depends_on) {
            return Ok(task);
        }
        task.touch();
        self.commit_record(&current, task)
    }

    /// Rewrite one record in place (no folder changes) and commit it.
    fn commit_record(&self, current: &TaskIndex, task: Task) -> Result<Task> {
        let folder = Self::folder_in(current, &task.id)?;
        self.folders.write_task(&folder, &task)?;

        let mut next = current.clone();
        next.replace(task.clone());
        let root = Self::root_or_self(&next, &task.id);
        self.commit(next, [root])?;
        Ok(task)
    }

    /// Regenerate every root's view document. Returns the number written.
    pub fn rebuild_views(&self) -> Result<usize> {
        let _guard = self.begin_write()?;
        let current = self.snapshot()?;
        for root in current.roots() {
            self.write_view(&current, root)?;
        }
        info!(project = %self.project_id, views = current.roots().len(), "rebuilt project views");
        Ok(current.roots().len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.snapshot()?.get(id).cloned())
    }

    pub fn task_count(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    /// All tasks, oldest first.
    pub fn get_all_tasks(&self) -> Result<Vec<Task>> {
        Ok(sorted(self.snapshot()?.tasks().cloned().collect()))
    }

    pub fn get_root_tasks(&self) -> Result<Vec<Task>> {
        let index = self.snapshot()?;
        Ok(index
            .roots()
            .iter()
            .filter_map(|id| index.get(id).cloned())
            .collect())
    }

    pub fn get_children(&self, id: &str) -> Result<Vec<Task>> {
        let index = self.snapshot()?;
        if !index.contains(id) {
            return Err(Error::task_not_found(id));
        }
        Ok(index
            .children(id)
            .iter()
            .filter_map(|child| index.get(child).cloned())
            .collect())
    }

    /// The top-level ancestor of `id` (itself for a root task).
    pub fn get_root_of(&self, id: &str) -> Result<Task> {
        let index = self.snapshot()?;
        index
            .root_of(id)
            .and_then(|root| index.get(&root).cloned())
            .ok_or_else(|| Error::task_not_found(id))
    }

    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        self.filter_tasks(|t| t.status == status)
    }

    pub fn get_tasks_by_agent(&self, agent: &str) -> Result<Vec<Task>> {
        self.filter_tasks(|t| t.assigned_agent.as_deref() == Some(agent))
    }

    pub fn get_tasks_by_tag(&self, tag: &str) -> Result<Vec<Task>> {
        self.filter_tasks(|t| t.tags.contains(tag))
    }

    fn filter_tasks(&self, pred: impl Fn(&Task) -> bool) -> Result<Vec<Task>> {
        let index = self.snapshot()?;
        Ok(sorted(index.tasks().filter(|t| pred(t)).cloned().collect()))
    }

    /// Pending tasks whose dependencies are all completed.
    pub fn get_ready_tasks(&self) -> Result<Vec<Task>> {
        let index = self.snapshot()?;
        let mut ready = Vec::new();
        for task in index.tasks().filter(|t| t.status == TaskStatus::Pending) {
            if graph::can_start(&index, &task.id)? {
                ready.push(task.clone());
            }
        }
        Ok(sorted(ready))
    }

    /// Unfinished tasks with at least one unmet dependency.
    pub fn get_blocked_tasks(&self) -> Result<Vec<Task>> {
        let index = self.snapshot()?;
        let mut blocked = Vec::new();
        for task in index.tasks().filter(|t| t.status != TaskStatus::Completed) {
            if !graph::can_start(&index, &task.id)? {
                blocked.push(task.clone());
            }
        }
        Ok(sorted(blocked))
    }

    pub fn dependencies_of(&self, id: &str) -> Result<Vec<Task>> {
        graph::dependencies_of(&*self.snapshot()?, id)
    }

    pub fn dependents_of(&self, id: &str) -> Result<Vec<Task>> {
        graph::dependents_of(&*self.snapshot()?, id)
    }

    pub fn can_start(&self, id: &str) -> Result<bool> {
        graph::can_start(&*self.snapshot()?, id)
    }

    /// Every root with its nested children, built in memory.
    pub fn get_task_tree(&self) -> Result<Vec<TaskNode>> {
        Ok(view::build_forest(&*self.snapshot()?))
    }

    /// Status counts over the whole project.
    pub fn get_summary(&self) -> Result<ViewSummary> {
        Ok(ViewSummary::from_tasks(self.snapshot()?.tasks()))
    }

    /// The view document for the root of `task_id`, built in memory.
    pub fn get_project_view(&self, task_id: &str) -> Result<ProjectView> {
        let index = self.snapshot()?;
        let root = index
            .root_of(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;
        view::build_view(&index, &root, &self.project_id, &self.project_title)
    }

    /// The persisted `project_data.json` for the root of `task_id`.
    pub fn read_project_view(&self, task_id: &str) -> Result<ProjectView> {
        let index = self.snapshot()?;
        let root = index
            .root_of(task_id)
            .ok_or_else(|| Error::task_not_found(task_id))?;
        self.folders.read_view(&Self::folder_in(&index, &root)?)
    }

    /// Folder currently holding the task.
    pub fn task_folder(&self, id: &str) -> Result<PathBuf> {
        Self::folder_in(&*self.snapshot()?, id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notes and attachments
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the task's `notes.md`.
    pub fn update_task_notes(&self, id: &str, text: &str) -> Result<()> {
        let _guard = self.begin_write()?;
        let folder = self.task_folder(id)?;
        self.folders.write_notes(&folder, text)
    }

    pub fn get_task_notes(&self, id: &str) -> Result<String> {
        self.folders.read_notes(&self.task_folder(id)?)
    }

    pub fn list_task_files(&self, id: &str) -> Result<Vec<FileInfo>> {
        self.folders.list_files(&self.task_folder(id)?)
    }

    pub fn put_task_file(&self, id: &str, name: &str, bytes: &[u8]) -> Result<()> {
        let _guard = self.begin_write()?;
        let folder = self.task_folder(id)?;
        self.folders.put_file(&folder, name, bytes)?;
        debug!(task_id = %id, file = %name, size = bytes.len(), "stored task file");
        Ok(())
    }

    pub fn get_task_file(&self, id: &str, name: &str) -> Result<Vec<u8>> {
        self.folders.get_file(&self.task_folder(id)?, name)
    }

    pub fn delete_task_file(&self, id: &str, name: &str) -> Result<()> {
        let _guard = self.begin_write()?;
        let folder = self.task_folder(id)?;
        self.folders.delete_file(&folder, name)
    }
}

fn clean_tags(tags: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn apply_update(task: &mut Task, update: TaskUpdate) -> Result<()> {
    if let Some(title) = update.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::invalid("task title must not be empty"));
        }
        task.title = title.to_string();
    }
    if let Some(description) = update.description {
        task.description = description;
    }
    if let Some(status) = update.status {
        task.status = status;
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if let Some(agent) = update.assigned_agent {
        task.assigned_agent = agent;
    }
    if let Some(tags) = update.tags {
        task.tags = clean_tags(tags);
    }
    task.tags.extend(clean_tags(update.add_tags));
    for tag in update.remove_tags {
        task.tags.remove(tag.trim());
    }
    Ok(())
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    tasks
}
