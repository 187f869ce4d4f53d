//! Per-project knowledge entries.
//!
//! Entries are kept in a single `knowledge.json` document at the project
//! root, loaded once and rewritten wholesale on every mutation. Links to tasks
//! are stored on the entry (`linked_task_ids`) and resolved in both
//! directions by the store.

mod store;

pub use store::KnowledgeStore;

use serde::{Deserialize, Serialize};

use crate::types::KnowledgeEntry;

/// Current `knowledge.json` schema version.
pub const KNOWLEDGE_VERSION: u32 = 1;

/// On-disk shape of `knowledge.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<KnowledgeEntry>,
}

impl Default for KnowledgeDocument {
    fn default() -> Self {
        Self {
            version: KNOWLEDGE_VERSION,
            entries: Vec::new(),
        }
    }
}
