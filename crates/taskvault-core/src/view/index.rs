//! In-memory task map with a parent→children index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::types::Task;

/// All tasks of one project plus the indexes needed to walk the tree.
///
/// Children lists are kept ordered by `(created_at, id)` and updated on every
/// insert/remove, so building a subtree never scans the whole map.
#[derive(Debug, Clone, Default)]
pub struct TaskIndex {
    tasks: HashMap<String, Task>,
    folders: HashMap<String, PathBuf>,
    children: HashMap<String, Vec<String>>,
    roots: Vec<String>,
}

impl TaskIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn folder(&self, id: &str) -> Option<&Path> {
        self.folders.get(id).map(PathBuf::as_path)
    }

    /// Ids of root tasks, oldest first.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Ids of direct children, oldest first.
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add a task. Its parent, if any, must already be present.
    pub fn insert(&mut self, task: Task, folder: PathBuf) {
        let id = task.id.clone();
        let key = (task.created_at, task.id.clone());
        let tasks = &self.tasks;
        let list = match &task.parent_id {
            Some(parent) => self.children.entry(parent.clone()).or_default(),
            None => &mut self.roots,
        };
        let pos = list.partition_point(|other| {
            tasks
                .get(other)
                .map(|t| (t.created_at, t.id.clone()) < key)
                .unwrap_or(true)
        });
        list.insert(pos, id.clone());
        self.folders.insert(id.clone(), folder);
        self.tasks.insert(id, task);
    }

    /// Replace a task record in place. Parent changes go through `reparent`.
    pub fn replace(&mut self, task: Task) {
        if let Some(slot) = self.tasks.get_mut(&task.id) {
            debug_assert_eq!(slot.parent_id, task.parent_id);
            *slot = task;
        }
    }

    /// Remove one task (not its subtree) from the map and indexes.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let task = self.tasks.remove(id)?;
        self.folders.remove(id);
        self.children.remove(id);
        self.detach(&task);
        Some(task)
    }

    /// Move `id` under `new_parent` (or to the top level) and record its new folder.
    pub fn reparent(&mut self, id: &str, new_parent: Option<String>, folder: PathBuf) {
        let Some(mut task) = self.tasks.remove(id) else {
            return;
        };
        self.detach(&task);
        task.parent_id = new_parent;
        let kids = self.children.remove(id);
        self.insert(task, folder);
        if let Some(kids) = kids {
            self.children.insert(id.to_string(), kids);
        }
    }

    /// Point every folder under `old` at the same relative location under `new`.
    pub fn rebase_folders(&mut self, old: &Path, new: &Path) {
        for folder in self.folders.values_mut() {
            if let Ok(rest) = folder.strip_prefix(old) {
                *folder = if rest.as_os_str().is_empty() {
                    new.to_path_buf()
                } else {
                    new.join(rest)
                };
            }
        }
    }

    fn detach(&mut self, task: &Task) {
        let list = match &task.parent_id {
            Some(parent) => match self.children.get_mut(parent) {
                Some(list) => list,
                None => return,
            },
            None => &mut self.roots,
        };
        list.retain(|other| other != &task.id);
    }

    /// Chain of ancestor ids, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.tasks.get(id).and_then(|t| t.parent_id.clone());
        while let Some(parent) = current {
            // A corrupted record could point back into its own chain
            if chain.contains(&parent) || parent == id {
                break;
            }
            current = self.tasks.get(&parent).and_then(|t| t.parent_id.clone());
            chain.push(parent);
        }
        chain
    }

    /// Id of the top-level ancestor; a root task is its own root.
    pub fn root_of(&self, id: &str) -> Option<String> {
        if !self.contains(id) {
            return None;
        }
        Some(self.ancestors(id).pop().unwrap_or_else(|| id.to_string()))
    }

    /// Nesting depth, root tasks are 1.
    pub fn depth(&self, id: &str) -> usize {
        self.ancestors(id).len() + 1
    }

    /// `id` followed by all its descendants, depth-first.
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(&current).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// Height of the subtree at `id` (a leaf is 1).
    pub fn subtree_height(&self, id: &str) -> usize {
        self.children(id)
            .iter()
            .map(|child| self.subtree_height(child))
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskPriority;
    use chrono::Duration;

    fn task(title: &str, parent: Option<&Task>, offset_secs: i64) -> Task {
        let mut t = Task::new(title, "", TaskPriority::Medium);
        t.parent_id = parent.map(|p| p.id.clone());
        t.created_at += Duration::seconds(offset_secs);
        t
    }

    #[test]
    fn test_children_ordered_by_creation() {
        let mut index = TaskIndex::new();
        let root = task("root", None, 0);
        let late = task("late", Some(&root), 10);
        let early = task("early", Some(&root), 5);
        index.insert(root.clone(), PathBuf::from("r"));
        index.insert(late.clone(), PathBuf::from("r/l"));
        index.insert(early.clone(), PathBuf::from("r/e"));

        assert_eq!(index.children(&root.id), &[early.id.clone(), late.id.clone()]);
        assert_eq!(index.roots(), &[root.id.clone()]);
    }

    #[test]
    fn test_root_of_and_depth() {
        let mut index = TaskIndex::new();
        let a = task("a", None, 0);
        let b = task("b", Some(&a), 1);
        let c = task("c", Some(&b), 2);
        index.insert(a.clone(), PathBuf::from("a"));
        index.insert(b.clone(), PathBuf::from("a/b"));
        index.insert(c.clone(), PathBuf::from("a/b/c"));

        assert_eq!(index.root_of(&c.id), Some(a.id.clone()));
        assert_eq!(index.root_of(&a.id), Some(a.id.clone()));
        assert_eq!(index.depth(&c.id), 3);
        assert_eq!(index.ancestors(&c.id), vec![b.id.clone(), a.id.clone()]);
        assert_eq!(index.subtree_ids(&a.id), vec![a.id.clone(), b.id.clone(), c.id.clone()]);
        assert_eq!(index.subtree_height(&a.id), 3);
        assert_eq!(index.root_of("missing"), None);
    }

    #[test]
    fn test_remove_detaches_from_parent() {
        let mut index = TaskIndex::new();
        let a = task("a", None, 0);
        let b = task("b", Some(&a), 1);
        index.insert(a.clone(), PathBuf::from("a"));
        index.insert(b.clone(), PathBuf::from("a/b"));

        assert!(index.remove(&b.id).is_some());
        assert!(index.children(&a.id).is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_reparent_keeps_children() {
        let mut index = TaskIndex::new();
        let a = task("a", None, 0);
        let b = task("b", None, 1);
        let c = task("c", Some(&a), 2);
        let d = task("d", Some(&c), 3);
        for (t, p) in [(&a, "a"), (&b, "b"), (&c, "a/c"), (&d, "a/c/d")] {
            index.insert(t.clone(), PathBuf::from(p));
        }

        index.reparent(&c.id, Some(b.id.clone()), PathBuf::from("b/c"));
        index.rebase_folders(Path::new("a/c"), Path::new("b/c"));

        assert!(index.children(&a.id).is_empty());
        assert_eq!(index.children(&b.id), &[c.id.clone()]);
        assert_eq!(index.children(&c.id), &[d.id.clone()]);
        assert_eq!(index.root_of(&d.id), Some(b.id.clone()));
        assert_eq!(index.folder(&d.id), Some(Path::new("b/c/d")));
    }
}
