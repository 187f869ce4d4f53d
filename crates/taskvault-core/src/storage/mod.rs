//! Folder persistence for the task tree.
//!
//! Each task owns a folder named `<slug>-<id8>` holding its record, notes and
//! attachments. Children live under the parent's `tasks/` directory, so the
//! folder hierarchy mirrors the task hierarchy. Every document is replaced
//! with a temp-file rename.

mod atomic;
pub mod layout;
mod lock;

pub use atomic::{write_atomic, write_json_atomic, TEMP_PREFIX};
pub use layout::slugify;
pub use lock::ProjectLock;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::Task;
use crate::view::ProjectView;

use layout::{children_dir, FILES_DIR, NOTES_FILE, TASK_FILE, TASKS_DIR, VIEW_FILE};

/// An attachment in a task's `files/` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
}

/// A task record found during a project walk.
#[derive(Debug, Clone)]
pub struct LoadedTask {
    pub task: Task,
    pub folder: PathBuf,
    /// Id of the task whose folder contains this one, `None` at the top level.
    pub folder_parent_id: Option<String>,
    /// Nesting depth, root tasks are 1.
    pub depth: usize,
}

/// Reads and writes task folders below `<project>/tasks/`.
#[derive(Debug, Clone)]
pub struct TaskFolders {
    project_dir: PathBuf,
    fsync: bool,
}

impl TaskFolders {
    pub fn new(project_dir: impl Into<PathBuf>, fsync: bool) -> Self {
        Self {
            project_dir: project_dir.into(),
            fsync,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// `<project>/tasks`
    pub fn tasks_root(&self) -> PathBuf {
        self.project_dir.join(TASKS_DIR)
    }

    /// Folder for `task` under `parent_folder`, or under the project root.
    pub fn folder_for(&self, parent_folder: Option<&Path>, task: &Task) -> PathBuf {
        let base = match parent_folder {
            Some(parent) => children_dir(parent),
            None => self.tasks_root(),
        };
        base.join(layout::task_folder_name(task))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Task records
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the folder skeleton for a new task: record, empty notes, `files/`, `tasks/`.
    pub fn create_task_folder(&self, folder: &Path, task: &Task) -> Result<()> {
        fs::create_dir_all(folder.join(FILES_DIR))?;
        fs::create_dir_all(folder.join(TASKS_DIR))?;
        if !folder.join(NOTES_FILE).exists() {
            write_atomic(&folder.join(NOTES_FILE), b"", self.fsync)?;
        }
        self.write_task(folder, task)
    }

    /// Write `task.json` in `folder`.
    pub fn write_task(&self, folder: &Path, task: &Task) -> Result<()> {
        fs::create_dir_all(folder)?;
        write_json_atomic(&folder.join(TASK_FILE), task, self.fsync)?;
        debug!(task_id = %task.id, folder = %folder.display(), "wrote task record");
        Ok(())
    }

    /// Read `task.json` from `folder`.
    pub fn read_task(&self, folder: &Path) -> Result<Task> {
        let path = folder.join(TASK_FILE);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::task_not_found(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Move a task folder (and its subtree) to `to`.
    pub fn move_folder(&self, from: &Path, to: &Path) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)?;
        debug!(from = %from.display(), to = %to.display(), "moved task folder");
        Ok(())
    }

    /// Remove a task folder and everything below it.
    pub fn remove_folder(&self, folder: &Path) -> Result<()> {
        match fs::remove_dir_all(folder) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notes
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace `notes.md` wholesale.
    pub fn write_notes(&self, folder: &Path, text: &str) -> Result<()> {
        write_atomic(&folder.join(NOTES_FILE), text.as_bytes(), self.fsync)
    }

    /// Read `notes.md`; a missing file reads as empty.
    pub fn read_notes(&self, folder: &Path) -> Result<String> {
        match fs::read_to_string(folder.join(NOTES_FILE)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attachments
    // ─────────────────────────────────────────────────────────────────────────

    /// List attachments, sorted by name.
    pub fn list_files(&self, folder: &Path) -> Result<Vec<FileInfo>> {
        let dir = folder.join(FILES_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            files.push(FileInfo {
                name,
                size: meta.len(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Store an attachment, replacing any file with the same name.
    pub fn put_file(&self, folder: &Path, name: &str, bytes: &[u8]) -> Result<()> {
        validate_file_name(name)?;
        let dir = folder.join(FILES_DIR);
        fs::create_dir_all(&dir)?;
        write_atomic(&dir.join(name), bytes, self.fsync)
    }

    pub fn get_file(&self, folder: &Path, name: &str) -> Result<Vec<u8>> {
        validate_file_name(name)?;
        fs::read(folder.join(FILES_DIR).join(name)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::file_not_found(name),
            _ => Error::Io(e),
        })
    }

    pub fn delete_file(&self, folder: &Path, name: &str) -> Result<()> {
        validate_file_name(name)?;
        fs::remove_file(folder.join(FILES_DIR).join(name)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::file_not_found(name),
            _ => Error::Io(e),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Project view documents
    // ─────────────────────────────────────────────────────────────────────────

    pub fn write_view(&self, root_folder: &Path, view: &ProjectView) -> Result<()> {
        write_json_atomic(&root_folder.join(VIEW_FILE), view, self.fsync)
    }

    /// Remove a view document; used when a root task gains a parent.
    pub fn remove_view(&self, folder: &Path) -> Result<()> {
        match fs::remove_file(folder.join(VIEW_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn read_view(&self, root_folder: &Path) -> Result<ProjectView> {
        let path = root_folder.join(VIEW_FILE);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound {
                kind: "Project view",
                id: path.display().to_string(),
            },
            _ => Error::Io(e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Project walk
    // ─────────────────────────────────────────────────────────────────────────

    /// Walk `<project>/tasks/` recursively and read every task record.
    ///
    /// A folder whose record is missing or unparsable is skipped with a warning
    /// together with its subtree, whose parent could not be resolved anyway.
    pub fn load_all(&self) -> Result<Vec<LoadedTask>> {
        let mut loaded = Vec::new();
        let root = self.tasks_root();
        if !root.exists() {
            return Ok(loaded);
        }

        // (dir holding task folders, id of owning task, depth of tasks in dir)
        let mut pending: Vec<(PathBuf, Option<String>, usize)> = vec![(root, None, 1)];
        while let Some((dir, parent_id, depth)) = pending.pop() {
            let mut folders: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            folders.sort();

            for folder in folders {
                let task = match self.read_task(&folder) {
                    Ok(task) => task,
                    Err(e) => {
                        let hidden = count_task_folders(&children_dir(&folder));
                        warn!(
                            folder = %folder.display(),
                            hidden_descendants = hidden,
                            error = %e,
                            "skipping unreadable task folder and its subtree"
                        );
                        continue;
                    }
                };
                pending.push((children_dir(&folder), Some(task.id.clone()), depth + 1));
                loaded.push(LoadedTask {
                    task,
                    folder,
                    folder_parent_id: parent_id.clone(),
                    depth,
                });
            }
        }

        Ok(loaded)
    }
}

/// Number of task folders nested anywhere below a `tasks/` directory.
fn count_task_folders(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(|folder| 1 + count_task_folders(&children_dir(&folder)))
        .sum()
}

/// Attachment names are a flat namespace: no separators, no dot segments,
/// nothing that could be mistaken for a temp file.
fn validate_file_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with(TEMP_PREFIX)
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(Error::invalid(format!("invalid attachment name '{}'", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskPriority;
    use tempfile::tempdir;

    fn folders() -> (TaskFolders, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (TaskFolders::new(dir.path(), false), dir)
    }

    #[test]
    fn test_create_task_folder_layout() {
        let (store, _dir) = folders();
        let task = Task::new("Build X", "", TaskPriority::High);
        let folder = store.folder_for(None, &task);
        store.create_task_folder(&folder, &task).unwrap();

        assert!(folder.starts_with(store.tasks_root()));
        assert!(folder.join(TASK_FILE).is_file());
        assert!(folder.join(NOTES_FILE).is_file());
        assert!(folder.join(FILES_DIR).is_dir());
        assert!(folder.join(TASKS_DIR).is_dir());
        assert_eq!(store.read_notes(&folder).unwrap(), "");
        assert_eq!(store.read_task(&folder).unwrap(), task);
    }

    #[test]
    fn test_read_task_missing_is_not_found() {
        let (store, dir) = folders();
        let err = store.read_task(dir.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_notes_overwrite() {
        let (store, _dir) = folders();
        let task = Task::new("Notes", "", TaskPriority::Low);
        let folder = store.folder_for(None, &task);
        store.create_task_folder(&folder, &task).unwrap();

        store.write_notes(&folder, "# first\nlong text").unwrap();
        store.write_notes(&folder, "second").unwrap();
        assert_eq!(store.read_notes(&folder).unwrap(), "second");
    }

    #[test]
    fn test_files_put_list_get() {
        let (store, _dir) = folders();
        let task = Task::new("Files", "", TaskPriority::Low);
        let folder = store.folder_for(None, &task);
        store.create_task_folder(&folder, &task).unwrap();

        store.put_file(&folder, "b.txt", b"bbb").unwrap();
        store.put_file(&folder, "a.bin", &[0, 1, 2, 3]).unwrap();
        store.put_file(&folder, "b.txt", b"replaced").unwrap();

        let files = store.list_files(&folder).unwrap();
        assert_eq!(
            files,
            vec![
                FileInfo { name: "a.bin".into(), size: 4 },
                FileInfo { name: "b.txt".into(), size: 8 },
            ]
        );
        assert_eq!(store.get_file(&folder, "b.txt").unwrap(), b"replaced");
        assert!(store.get_file(&folder, "nope").unwrap_err().is_not_found());

        store.delete_file(&folder, "a.bin").unwrap();
        assert_eq!(store.list_files(&folder).unwrap().len(), 1);
    }

    #[test]
    fn test_file_names_are_flat() {
        let (store, _dir) = folders();
        let task = Task::new("Files", "", TaskPriority::Low);
        let folder = store.folder_for(None, &task);
        store.create_task_folder(&folder, &task).unwrap();

        for name in ["", "..", "../escape.txt", "sub/dir.txt", ".tv-tmp.report.txt"] {
            assert!(matches!(
                store.put_file(&folder, name, b"x"),
                Err(Error::InvalidState(_))
            ));
        }
    }

    #[test]
    fn test_load_all_skips_corrupt_folder() {
        let (store, _dir) = folders();

        let root = Task::new("Root", "", TaskPriority::Medium);
        let root_folder = store.folder_for(None, &root);
        store.create_task_folder(&root_folder, &root).unwrap();

        let mut child = Task::new("Child", "", TaskPriority::Medium);
        child.parent_id = Some(root.id.clone());
        let child_folder = store.folder_for(Some(&root_folder), &child);
        store.create_task_folder(&child_folder, &child).unwrap();

        let corrupt = store.tasks_root().join("broken-12345678");
        fs::create_dir_all(&corrupt).unwrap();
        fs::write(corrupt.join(TASK_FILE), "{ not json").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);

        let child_loaded = loaded.iter().find(|l| l.task.id == child.id).unwrap();
        assert_eq!(child_loaded.folder_parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(child_loaded.depth, 2);
        assert_eq!(child_loaded.folder, child_folder);
    }

    #[test]
    fn test_dotted_attachment_names_are_listed() {
        let (store, _dir) = folders();
        let task = Task::new("Files", "", TaskPriority::Low);
        let folder = store.folder_for(None, &task);
        store.create_task_folder(&folder, &task).unwrap();

        store.put_file(&folder, ".env.tmp.bak", b"x").unwrap();
        fs::write(folder.join(FILES_DIR).join(".tv-tmp.half.1.2"), b"partial").unwrap();

        let names: Vec<String> = store
            .list_files(&folder)
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec![".env.tmp.bak".to_string()]);
    }

    #[test]
    fn test_corrupt_folder_hides_its_subtree() {
        let (store, _dir) = folders();

        let root = Task::new("Root", "", TaskPriority::Medium);
        let root_folder = store.folder_for(None, &root);
        store.create_task_folder(&root_folder, &root).unwrap();

        let mut mid = Task::new("Mid", "", TaskPriority::Medium);
        mid.parent_id = Some(root.id.clone());
        let mid_folder = store.folder_for(Some(&root_folder), &mid);
        store.create_task_folder(&mid_folder, &mid).unwrap();

        let mut leaf = Task::new("Leaf", "", TaskPriority::Medium);
        leaf.parent_id = Some(mid.id.clone());
        let leaf_folder = store.folder_for(Some(&mid_folder), &leaf);
        store.create_task_folder(&leaf_folder, &leaf).unwrap();

        fs::write(mid_folder.join(TASK_FILE), "{ not json").unwrap();

        let ids: Vec<String> = store.load_all().unwrap().into_iter().map(|l| l.task.id).collect();
        assert_eq!(ids, vec![root.id.clone()]);
        assert_eq!(count_task_folders(&children_dir(&mid_folder)), 1);
        assert_eq!(count_task_folders(&store.tasks_root()), 3);
    }

    #[test]
    fn test_load_all_empty_project() {
        let (store, _dir) = folders();
        assert!(store.load_all().unwrap().is_empty());
    }
}
