//! Project directory and store factory.
//!
//! A `ProjectManager` is an explicit handle over one projects directory:
//!
//! ```text
//! <root>/<slug>/
//!     project.json        # name, slug, created_at, status
//!     knowledge.json      # knowledge entries
//!     tasks/              # task folders
//! ```
//!
//! It lazily opens one `TaskStore` and one `KnowledgeStore` per project and
//! hands out the same `Arc` for the rest of its lifetime, so every caller of a
//! project sees the same in-memory state. Separate managers are fully
//! isolated from each other.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeStore;
use crate::storage::layout::{PROJECT_FILE, TASKS_DIR};
use crate::storage::{slugify, write_json_atomic};
use crate::task::TaskStore;
use crate::types::{KnowledgeEntry, Project, ProjectStatus, Task, TaskStatus};
use crate::view::ViewSummary;

/// Read-only situational snapshot of one project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectContext {
    pub project: Project,
    pub summary: ViewSummary,
    pub in_progress: Vec<Task>,
    pub pending: Vec<Task>,
    pub recent_knowledge: Vec<KnowledgeEntry>,
}

pub struct ProjectManager {
    root: PathBuf,
    config: StoreConfig,
    task_stores: Mutex<HashMap<String, Arc<TaskStore>>>,
    knowledge_stores: Mutex<HashMap<String, Arc<KnowledgeStore>>>,
}

impl ProjectManager {
    /// Manage the projects below `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened projects directory");
        Ok(Self {
            root,
            config,
            task_stores: Mutex::new(HashMap::new()),
            knowledge_stores: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn project_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    fn read_project(dir: &Path) -> Result<Option<Project>> {
        let content = match fs::read_to_string(dir.join(PROJECT_FILE)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let mut project: Project = serde_json::from_str(&content)?;
        if let Some(key) = dir.file_name() {
            project.slug = key.to_string_lossy().into_owned();
        }
        project.path = dir.to_path_buf();
        Ok(Some(project))
    }

    /// Find a project by its name, or by its directory key.
    ///
    /// Names are compared trimmed and case-insensitively. Different names can
    /// share a slug, so the directory alone does not identify a project.
    fn find_project(&self, name: &str) -> Result<Option<Project>> {
        let wanted = normalize_name(name);
        let slug = slugify(name);
        if let Some(project) = Self::read_project(&self.project_dir(&slug))? {
            if normalize_name(&project.name) == wanted {
                return Ok(Some(project));
            }
        }
        let projects = self.list_projects()?;
        if let Some(project) = projects.iter().find(|p| normalize_name(&p.name) == wanted) {
            return Ok(Some(project.clone()));
        }
        if slug == name.trim() {
            return Ok(projects.into_iter().find(|p| p.slug == slug));
        }
        Ok(None)
    }

    /// First free directory key for `name`: its slug, then `<slug>-2`, `<slug>-3`, ...
    fn free_slug(&self, name: &str) -> String {
        let base = slugify(name);
        let mut slug = base.clone();
        let mut n = 2;
        while self.project_dir(&slug).exists() {
            slug = format!("{}-{}", base, n);
            n += 1;
        }
        slug
    }

    /// Create a project and return its directory.
    ///
    /// Creating a project that already exists returns the existing directory
    /// and leaves its contents alone. A new name whose slug is already taken by
    /// another project gets a numbered directory.
    pub fn create_project(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid("project name must not be empty"));
        }
        if let Some(project) = self.find_project(name)? {
            debug!(project = %project.slug, "project already exists");
            return Ok(project.path);
        }

        let slug = self.free_slug(name);
        let dir = self.project_dir(&slug);
        fs::create_dir_all(dir.join(TASKS_DIR))?;
        let project = Project {
            name: name.to_string(),
            slug: slug.clone(),
            created_at: Utc::now(),
            status: ProjectStatus::Active,
            path: dir.clone(),
        };
        write_json_atomic(&dir.join(PROJECT_FILE), &project, self.config.fsync)?;
        info!(project = %slug, path = %dir.display(), "created project");
        Ok(dir)
    }

    /// True if a project with this name (or directory key) has been created.
    pub fn project_exists(&self, name: &str) -> bool {
        matches!(self.find_project(name), Ok(Some(_)))
    }

    /// Load a project's metadata.
    pub fn get_project(&self, name: &str) -> Result<Project> {
        self.find_project(name)?
            .ok_or_else(|| Error::project_not_found(name))
    }

    /// All projects, sorted by slug. Unreadable `project.json` files are skipped.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match Self::read_project(&entry.path()) {
                Ok(Some(project)) => projects.push(project),
                Ok(None) => {}
                Err(e) => warn!(dir = %entry.path().display(), error = %e, "skipping unreadable project"),
            }
        }
        projects.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(projects)
    }

    pub fn set_project_status(&self, name: &str, status: ProjectStatus) -> Result<Project> {
        let mut project = self.get_project(name)?;
        project.status = status;
        write_json_atomic(&project.path.join(PROJECT_FILE), &project, self.config.fsync)?;
        info!(project = %project.slug, status = %status, "updated project status");
        Ok(project)
    }

    /// The project's task store, opened on first use and cached afterwards.
    pub fn get_task_manager(&self, name: &str) -> Result<Arc<TaskStore>> {
        let project = self.get_project(name)?;
        let mut stores = self.task_stores.lock().map_err(|_| Error::LockPoisoned)?;
        if let Some(store) = stores.get(&project.slug) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(TaskStore::open(
            &project.path,
            project.slug.clone(),
            project.name.clone(),
            self.config.clone(),
        )?);
        stores.insert(project.slug, Arc::clone(&store));
        Ok(store)
    }

    /// The project's knowledge store, opened on first use and cached afterwards.
    pub fn get_knowledge_store(&self, name: &str) -> Result<Arc<KnowledgeStore>> {
        let tasks = self.get_task_manager(name)?;
        let slug = tasks.project_id().to_string();
        let mut stores = self.knowledge_stores.lock().map_err(|_| Error::LockPoisoned)?;
        if let Some(store) = stores.get(&slug) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(KnowledgeStore::open(
            tasks.project_dir().to_path_buf(),
            tasks,
            self.config.clone(),
        )?);
        stores.insert(slug, Arc::clone(&store));
        Ok(store)
    }

    /// In-progress and pending tasks plus the most recent knowledge entries.
    pub fn get_project_context(&self, name: &str) -> Result<ProjectContext> {
        let project = self.get_project(name)?;
        let tasks = self.get_task_manager(name)?;
        let knowledge = self.get_knowledge_store(name)?;

        Ok(ProjectContext {
            project,
            summary: tasks.get_summary()?,
            in_progress: tasks.get_tasks_by_status(TaskStatus::InProgress)?,
            pending: tasks.get_tasks_by_status(TaskStatus::Pending)?,
            recent_knowledge: knowledge.recent_entries(self.config.recent_knowledge_limit)?,
        })
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;
    use crate::types::KnowledgeType;
    use tempfile::tempdir;

    fn create_test_manager() -> (ProjectManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            fsync: false,
            ..Default::default()
        };
        let manager = ProjectManager::new(dir.path().join("projects"), config).unwrap();
        (manager, dir)
    }

    #[test]
    fn test_create_project_is_idempotent() {
        let (manager, _dir) = create_test_manager();
        let first = manager.create_project("Mobile App").unwrap();
        let created = manager.get_project("Mobile App").unwrap().created_at;

        let second = manager.create_project("Mobile App").unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("mobile-app"));
        assert!(first.join("tasks").is_dir());
        assert_eq!(manager.get_project("mobile-app").unwrap().created_at, created);
        assert!(manager.project_exists("Mobile App"));
        assert!(!manager.project_exists("Other"));
    }

    #[test]
    fn test_names_sharing_a_slug_stay_separate() {
        let (manager, _dir) = create_test_manager();
        let first = manager.create_project("日本語").unwrap();
        manager
            .get_task_manager("日本語")
            .unwrap()
            .create_task(NewTask::new("Only in the first"))
            .unwrap();

        assert!(!manager.project_exists("Русский"));
        let second = manager.create_project("Русский").unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("untitled-2"));
        assert_eq!(manager.get_project("Русский").unwrap().name, "Русский");
        assert_eq!(manager.get_project("日本語").unwrap().name, "日本語");
        assert_eq!(manager.get_task_manager("Русский").unwrap().task_count().unwrap(), 0);
        assert_eq!(manager.get_task_manager("日本語").unwrap().task_count().unwrap(), 1);

        let prefix = "x".repeat(60);
        let long_a = manager.create_project(&format!("{}-alpha", prefix)).unwrap();
        let long_b = manager.create_project(&format!("{}-bravo", prefix)).unwrap();
        assert_ne!(long_a, long_b);
        assert_eq!(manager.create_project(&format!("{}-BRAVO", prefix)).unwrap(), long_b);
        assert_eq!(manager.list_projects().unwrap().len(), 4);
    }

    #[test]
    fn test_list_and_status() {
        let (manager, _dir) = create_test_manager();
        manager.create_project("beta").unwrap();
        manager.create_project("Alpha").unwrap();
        fs::create_dir_all(manager.root().join("not-a-project")).unwrap();

        let slugs: Vec<String> = manager
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["alpha", "beta"]);

        let project = manager.set_project_status("beta", ProjectStatus::Paused).unwrap();
        assert_eq!(project.status, ProjectStatus::Paused);
        assert_eq!(manager.get_project("beta").unwrap().status, ProjectStatus::Paused);
        assert!(manager.get_project("gamma").unwrap_err().is_not_found());
    }

    #[test]
    fn test_stores_are_cached_per_project() {
        let (manager, _dir) = create_test_manager();
        manager.create_project("one").unwrap();
        manager.create_project("two").unwrap();

        let a = manager.get_task_manager("one").unwrap();
        let b = manager.get_task_manager("one").unwrap();
        let other = manager.get_task_manager("two").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));

        // Writes through one handle are visible through the other
        let task = a.create_task(NewTask::new("Shared")).unwrap();
        assert!(b.get_task(&task.id).unwrap().is_some());
        assert!(other.get_task(&task.id).unwrap().is_none());

        let k1 = manager.get_knowledge_store("one").unwrap();
        let k2 = manager.get_knowledge_store("one").unwrap();
        assert!(Arc::ptr_eq(&k1, &k2));

        assert!(manager.get_task_manager("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_separate_managers_are_isolated() {
        let (first, _d1) = create_test_manager();
        let (second, _d2) = create_test_manager();
        first.create_project("demo").unwrap();
        second.create_project("demo").unwrap();

        first
            .get_task_manager("demo")
            .unwrap()
            .create_task(NewTask::new("Only here"))
            .unwrap();
        assert_eq!(second.get_task_manager("demo").unwrap().task_count().unwrap(), 0);
    }

    #[test]
    fn test_project_context() {
        let (manager, _dir) = create_test_manager();
        manager.create_project("demo").unwrap();
        let tasks = manager.get_task_manager("demo").unwrap();
        let knowledge = manager.get_knowledge_store("demo").unwrap();

        let active = tasks.create_task(NewTask::new("Active")).unwrap();
        tasks.mark_task_in_progress(&active.id).unwrap();
        tasks.create_task(NewTask::new("Waiting")).unwrap();
        let done = tasks.create_task(NewTask::new("Done")).unwrap();
        tasks.mark_task_completed(&done.id).unwrap();
        for i in 0..7 {
            knowledge
                .add_entry(&format!("note {}", i), "", KnowledgeType::Context, vec![], None)
                .unwrap();
        }

        let context = manager.get_project_context("demo").unwrap();
        assert_eq!(context.project.slug, "demo");
        assert_eq!(context.in_progress.len(), 1);
        assert_eq!(context.in_progress[0].id, active.id);
        assert_eq!(context.pending.len(), 1);
        assert_eq!(context.summary.total_tasks, 3);
        assert_eq!(context.summary.completed, 1);
        assert_eq!(context.recent_knowledge.len(), 5);
        assert_eq!(context.recent_knowledge[0].title, "note 6");
    }
}
