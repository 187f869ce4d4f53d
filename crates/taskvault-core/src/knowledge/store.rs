use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::storage::layout::KNOWLEDGE_FILE;
use crate::storage::{write_json_atomic, ProjectLock};
use crate::task::TaskStore;
use crate::types::{KnowledgeEntry, KnowledgeType};

use super::KnowledgeDocument;

/// Knowledge entries of one project.
///
/// Task links are checked against the project's `TaskStore`, so both stores
/// must belong to the same project. Readers work from the last committed
/// snapshot and never wait on a writer.
#[derive(Debug)]
pub struct KnowledgeStore {
    path: PathBuf,
    project_dir: PathBuf,
    config: StoreConfig,
    tasks: Arc<TaskStore>,
    state: RwLock<Arc<Vec<KnowledgeEntry>>>,
    writer: Mutex<()>,
}

impl KnowledgeStore {
    /// Load `<project_dir>/knowledge.json`; a missing file is an empty store.
    pub fn open(project_dir: impl Into<PathBuf>, tasks: Arc<TaskStore>, config: StoreConfig) -> Result<Self> {
        let project_dir = project_dir.into();
        let path = project_dir.join(KNOWLEDGE_FILE);
        let doc = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<KnowledgeDocument>(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => KnowledgeDocument::default(),
            Err(e) => return Err(Error::Io(e)),
        };
        debug!(path = %path.display(), entries = doc.entries.len(), "loaded knowledge store");

        Ok(Self {
            path,
            project_dir,
            config,
            tasks,
            state: RwLock::new(Arc::new(doc.entries)),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Result<Arc<Vec<KnowledgeEntry>>> {
        let state = self.state.read().map_err(|_| Error::LockPoisoned)?;
        Ok(Arc::clone(&state))
    }

    /// Run `f` on a copy of the entries, persist the copy, then publish it.
    ///
    /// If the write fails the published entries are left as they were.
    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<KnowledgeEntry>) -> Result<T>) -> Result<T> {
        let _local = self.writer.lock().map_err(|_| Error::LockPoisoned)?;
        let _project = ProjectLock::acquire(&self.project_dir, self.config.file_lock)?;

        let mut staged = (*self.snapshot()?).clone();
        let out = f(&mut staged)?;
        let doc = KnowledgeDocument {
            entries: staged,
            ..Default::default()
        };
        write_json_atomic(&self.path, &doc, self.config.fsync)?;

        let mut state = self.state.write().map_err(|_| Error::LockPoisoned)?;
        *state = Arc::new(doc.entries);
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&[KnowledgeEntry]) -> T) -> Result<T> {
        let entries = self.snapshot()?;
        Ok(f(entries.as_slice()))
    }

    fn require_task(&self, task_id: &str) -> Result<()> {
        match self.tasks.get_task(task_id)? {
            Some(_) => Ok(()),
            None => Err(Error::task_not_found(task_id)),
        }
    }

    pub fn add_entry(
        &self,
        title: &str,
        content: &str,
        entry_type: KnowledgeType,
        tags: Vec<String>,
        source: Option<String>,
    ) -> Result<KnowledgeEntry> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::invalid("knowledge entry title must not be empty"));
        }
        let mut entry = KnowledgeEntry::new(title, content, entry_type);
        entry.tags = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        entry.source = source;

        self.mutate(|entries| {
            entries.push(entry.clone());
            Ok(())
        })?;
        info!(entry_id = %entry.id, entry_type = %entry.entry_type, "added knowledge entry");
        Ok(entry)
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<KnowledgeEntry>> {
        self.read(|entries| entries.iter().find(|e| e.id == id).cloned())
    }

    /// Every entry, in insertion order.
    pub fn all_entries(&self) -> Result<Vec<KnowledgeEntry>> {
        self.read(|entries| entries.to_vec())
    }

    pub fn get_entries_by_type(&self, entry_type: &KnowledgeType) -> Result<Vec<KnowledgeEntry>> {
        self.filter(|e| &e.entry_type == entry_type)
    }

    pub fn get_entries_by_tag(&self, tag: &str) -> Result<Vec<KnowledgeEntry>> {
        self.filter(|e| e.tags.contains(tag))
    }

    /// Entries whose title, content or tags contain `query`, ignoring case.
    pub fn search_entries(&self, query: &str) -> Result<Vec<KnowledgeEntry>> {
        self.filter(|e| e.matches(query))
    }

    pub fn get_entries_for_task(&self, task_id: &str) -> Result<Vec<KnowledgeEntry>> {
        self.filter(|e| e.linked_task_ids.contains(task_id))
    }

    /// The `limit` newest entries, newest first.
    pub fn recent_entries(&self, limit: usize) -> Result<Vec<KnowledgeEntry>> {
        let mut entries = self.all_entries()?;
        // Stable sort keeps later insertions ahead on equal timestamps
        entries.reverse();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    fn filter(&self, pred: impl Fn(&KnowledgeEntry) -> bool) -> Result<Vec<KnowledgeEntry>> {
        self.read(|entries| entries.iter().filter(|e| pred(e)).cloned().collect())
    }

    /// Associate an entry with a task. Both must exist; linking twice is a no-op.
    pub fn link_to_task(&self, entry_id: &str, task_id: &str) -> Result<KnowledgeEntry> {
        self.require_task(task_id)?;
        let entry = self.mutate(|entries| {
            let entry = find_mut(entries, entry_id)?;
            entry.linked_task_ids.insert(task_id.to_string());
            Ok(entry.clone())
        })?;
        debug!(entry_id = %entry_id, task_id = %task_id, "linked knowledge entry");
        Ok(entry)
    }

    /// Drop the association between an entry and a task.
    ///
    /// The task does not have to exist any more, so links to deleted tasks can
    /// be cleaned up.
    pub fn unlink_from_task(&self, entry_id: &str, task_id: &str) -> Result<KnowledgeEntry> {
        self.mutate(|entries| {
            let entry = find_mut(entries, entry_id)?;
            entry.linked_task_ids.remove(task_id);
            Ok(entry.clone())
        })
    }

    pub fn delete_entry(&self, id: &str) -> Result<KnowledgeEntry> {
        let removed = self.mutate(|entries| {
            let pos = entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| Error::entry_not_found(id))?;
            Ok(entries.remove(pos))
        })?;
        info!(entry_id = %id, "deleted knowledge entry");
        Ok(removed)
    }
}

fn find_mut<'a>(entries: &'a mut [KnowledgeEntry], id: &str) -> Result<&'a mut KnowledgeEntry> {
    entries
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or_else(|| Error::entry_not_found(id))
}
