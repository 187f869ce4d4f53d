//! Shared types for taskvault-core.
//!
//! These are the on-disk record types. Optional fields default when absent so
//! records written by older versions keep loading.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(Error::invalid(format!("unknown task status '{}'", other))),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(Error::invalid(format!("unknown task priority '{}'", other))),
        }
    }
}

/// A unit of tracked work. Stored as `task.json` in the task's folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub dependency_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with a fresh id.
    pub fn new(title: impl Into<String>, description: impl Into<String>, priority: TaskPriority) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority,
            assigned_agent: None,
            tags: BTreeSet::new(),
            parent_id: None,
            dependency_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// First eight characters of the id, used in folder names.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of knowledge entry. Unrecognized kinds are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KnowledgeType {
    TechnicalDecision,
    BestPractice,
    LessonLearned,
    Context,
    Pattern,
    Gotcha,
    Reference,
    Custom(String),
}

impl KnowledgeType {
    pub fn as_str(&self) -> &str {
        match self {
            KnowledgeType::TechnicalDecision => "technical_decision",
            KnowledgeType::BestPractice => "best_practice",
            KnowledgeType::LessonLearned => "lesson_learned",
            KnowledgeType::Context => "context",
            KnowledgeType::Pattern => "pattern",
            KnowledgeType::Gotcha => "gotcha",
            KnowledgeType::Reference => "reference",
            KnowledgeType::Custom(s) => s,
        }
    }
}

impl From<String> for KnowledgeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "technical_decision" => KnowledgeType::TechnicalDecision,
            "best_practice" => KnowledgeType::BestPractice,
            "lesson_learned" => KnowledgeType::LessonLearned,
            "context" => KnowledgeType::Context,
            "pattern" => KnowledgeType::Pattern,
            "gotcha" => KnowledgeType::Gotcha,
            "reference" => KnowledgeType::Reference,
            _ => KnowledgeType::Custom(s),
        }
    }
}

impl From<KnowledgeType> for String {
    fn from(kt: KnowledgeType) -> Self {
        match kt {
            KnowledgeType::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        if normalized.is_empty() {
            return Err(Error::invalid("knowledge type must not be empty"));
        }
        Ok(KnowledgeType::from(normalized))
    }
}

/// A freeform, typed, searchable note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub entry_type: KnowledgeType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub linked_task_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>, entry_type: KnowledgeType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            entry_type,
            tags: BTreeSet::new(),
            source: None,
            linked_task_ids: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Case-insensitive substring match over title, content and tags.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Archived,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "paused" => Ok(ProjectStatus::Paused),
            "completed" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            other => Err(Error::invalid(format!("unknown project status '{}'", other))),
        }
    }
}

/// Project metadata, stored as `project.json` at the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ProjectStatus,
    /// Resolved at load time; never written.
    #[serde(skip)]
    pub path: std::path::PathBuf,
}
