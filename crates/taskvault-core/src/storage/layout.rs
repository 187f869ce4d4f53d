//! On-disk layout of a project.
//!
//! ```text
//! <project>/tasks/<slug>-<id8>/
//!     task.json
//!     notes.md
//!     files/
//!     tasks/              # children, same structure
//!     project_data.json   # root tasks only
//! ```

use std::path::{Path, PathBuf};

use crate::types::Task;

pub const TASKS_DIR: &str = "tasks";
pub const TASK_FILE: &str = "task.json";
pub const NOTES_FILE: &str = "notes.md";
pub const FILES_DIR: &str = "files";
pub const VIEW_FILE: &str = "project_data.json";
pub const PROJECT_FILE: &str = "project.json";
pub const KNOWLEDGE_FILE: &str = "knowledge.json";
pub const LOCK_FILE: &str = ".taskvault.lock";

/// Longest slug kept in a folder name.
const MAX_SLUG_LEN: usize = 50;

/// Lowercase, alphanumeric-and-dash form of `text` for use in paths.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

/// Folder name for a task: `slugify(title)-<first 8 chars of id>`.
pub fn task_folder_name(task: &Task) -> String {
    format!("{}-{}", slugify(&task.title), task.short_id())
}

/// Directory that holds the child folders of `folder` (or of the project root).
pub fn children_dir(folder: &Path) -> PathBuf {
    folder.join(TASKS_DIR)
}
