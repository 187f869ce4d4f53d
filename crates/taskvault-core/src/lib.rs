//! taskvault-core - Core library for taskvault
//!
//! A hierarchical, folder-backed store for project tasks and knowledge:
//!
//! - **types**: Task, KnowledgeEntry and project metadata
//! - **storage**: Task tree mapped onto nested folders (records, notes, attachments)
//! - **graph**: Depends-on edges between tasks
//! - **view**: Aggregated `project_data.json` documents per root task
//! - **task**: Per-project task store (mutations + view rebuilds)
//! - **knowledge**: Per-project knowledge entries
//! - **project**: Project directory and store factory

pub mod config;
pub mod error;
pub mod graph;
pub mod knowledge;
pub mod project;
pub mod storage;
pub mod task;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use knowledge::KnowledgeStore;
pub use project::{ProjectContext, ProjectManager};
pub use task::{NewTask, TaskStore, TaskUpdate};
pub use types::{KnowledgeEntry, KnowledgeType, Project, ProjectStatus, Task, TaskPriority, TaskStatus};
pub use view::{ProjectView, TaskNode, ViewSummary};
