//! Depends-on edges between tasks of one project.
//!
//! Edges live on the dependent task (`Task::dependency_ids`) and may point
//! anywhere in the project, not only at siblings. Edges that would close a
//! cycle are rejected.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::{Task, TaskStatus};
use crate::view::TaskIndex;

/// Check that `task_id -> depends_on` may be added.
///
/// Both tasks must exist and the edge must not close a cycle (a task depending
/// on itself counts as one).
pub fn validate_dependency(index: &TaskIndex, task_id: &str, depends_on: &str) -> Result<()> {
    if !index.contains(task_id) {
        return Err(Error::task_not_found(task_id));
    }
    if !index.contains(depends_on) {
        return Err(Error::task_not_found(depends_on));
    }
    if would_create_cycle(index, task_id, depends_on) {
        return Err(Error::DependencyCycle {
            task_id: task_id.to_string(),
            depends_on: depends_on.to_string(),
        });
    }
    Ok(())
}

/// True if `depends_on` already reaches `task_id` through dependency edges.
pub fn would_create_cycle(index: &TaskIndex, task_id: &str, depends_on: &str) -> bool {
    if task_id == depends_on {
        return true;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![depends_on];
    while let Some(current) = stack.pop() {
        if current == task_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(task) = index.get(current) {
            stack.extend(task.dependency_ids.iter().map(String::as_str));
        }
    }
    false
}

/// Tasks that `task_id` depends on. Dangling ids are skipped.
pub fn dependencies_of(index: &TaskIndex, task_id: &str) -> Result<Vec<Task>> {
    let task = index.get(task_id).ok_or_else(|| Error::task_not_found(task_id))?;
    Ok(task
        .dependency_ids
        .iter()
        .filter_map(|id| index.get(id).cloned())
        .collect())
}

/// Tasks that depend on `task_id`.
pub fn dependents_of(index: &TaskIndex, task_id: &str) -> Result<Vec<Task>> {
    if !index.contains(task_id) {
        return Err(Error::task_not_found(task_id));
    }
    let mut dependents: Vec<Task> = index
        .tasks()
        .filter(|t| t.dependency_ids.contains(task_id))
        .cloned()
        .collect();
    dependents.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    Ok(dependents)
}

/// True iff every dependency of `task_id` is completed.
///
/// A dependency id that no longer resolves counts as unmet.
pub fn can_start(index: &TaskIndex, task_id: &str) -> Result<bool> {
    let task = index.get(task_id).ok_or_else(|| Error::task_not_found(task_id))?;
    Ok(task.dependency_ids.iter().all(|id| {
        index
            .get(id)
            .map(|dep| dep.status == TaskStatus::Completed)
            .unwrap_or(false)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskPriority;
    use std::path::PathBuf;

    fn index_with(tasks: &[&Task]) -> TaskIndex {
        let mut index = TaskIndex::new();
        for t in tasks {
            index.insert((*t).clone(), PathBuf::from(&t.id));
        }
        index
    }

    #[test]
    fn test_cycle_detection() {
        let a = Task::new("a", "", TaskPriority::Medium);
        let mut b = Task::new("b", "", TaskPriority::Medium);
        let mut c = Task::new("c", "", TaskPriority::Medium);
        // c -> b -> a
        b.dependency_ids.insert(a.id.clone());
        c.dependency_ids.insert(b.id.clone());
        let index = index_with(&[&a, &b, &c]);

        assert!(would_create_cycle(&index, &a.id, &c.id));
        assert!(would_create_cycle(&index, &a.id, &a.id));
        assert!(!would_create_cycle(&index, &c.id, &a.id));

        assert!(matches!(
            validate_dependency(&index, &a.id, &c.id),
            Err(Error::DependencyCycle { .. })
        ));
        assert!(validate_dependency(&index, &c.id, &a.id).is_ok());
        assert!(validate_dependency(&index, &c.id, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_can_start() {
        let mut a = Task::new("a", "", TaskPriority::Medium);
        let b = Task::new("b", "", TaskPriority::Medium);
        let mut c = Task::new("c", "", TaskPriority::Medium);
        c.dependency_ids.insert(a.id.clone());
        c.dependency_ids.insert(b.id.clone());
        a.status = TaskStatus::Completed;

        let index = index_with(&[&a, &b, &c]);
        assert!(!can_start(&index, &c.id).unwrap());
        assert!(can_start(&index, &a.id).unwrap());

        let mut b_done = b.clone();
        b_done.status = TaskStatus::Completed;
        let index = index_with(&[&a, &b_done, &c]);
        assert!(can_start(&index, &c.id).unwrap());
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let a = Task::new("a", "", TaskPriority::Medium);
        let mut b = Task::new("b", "", TaskPriority::Medium);
        b.dependency_ids.insert(a.id.clone());
        b.dependency_ids.insert("dangling".into());
        let index = index_with(&[&a, &b]);

        let deps = dependencies_of(&index, &b.id).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].id, a.id);

        let dependents = dependents_of(&index, &a.id).unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].id, b.id);

        assert!(!can_start(&index, &b.id).unwrap());
    }
}
