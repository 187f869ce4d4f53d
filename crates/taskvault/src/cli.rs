//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// taskvault command line client
///
/// Hierarchical project tasks and knowledge, stored as plain folders.
#[derive(Parser, Debug)]
#[command(name = "tv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project lifecycle (create, list, show)
    Project(ProjectCommand),

    /// Task tree management
    Task(TaskCommand),

    /// Project knowledge base
    Knowledge(KnowledgeCommand),

    /// Import a todo list into a project's task tree
    Import {
        /// JSON file with `[{content, status}]` items
        path: PathBuf,

        /// Target project
        #[arg(short, long, env = "TASKVAULT_PROJECT")]
        project: String,

        /// Show what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Copy the project directory aside before writing
        #[arg(long)]
        backup: bool,
    },

    /// Show version information
    Version,
}

/// Project selector shared by task and knowledge commands.
#[derive(Args, Debug, Clone)]
pub struct ProjectArg {
    /// Project name
    #[arg(short, long, env = "TASKVAULT_PROJECT", global = true)]
    pub project: Option<String>,
}

impl ProjectArg {
    pub fn name(&self) -> anyhow::Result<&str> {
        self.project
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No project given (use --project or TASKVAULT_PROJECT)"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Project Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ProjectCommand {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// Create a project (no-op if it already exists)
    Create {
        /// Project name
        name: String,
    },

    /// List projects
    List,

    /// Show a project's summary, active work and recent knowledge
    Show {
        /// Project name
        name: String,
    },

    /// Set a project's status (active, paused, completed, archived)
    Status {
        /// Project name
        name: String,

        /// New status
        status: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Task Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct TaskCommand {
    #[command(flatten)]
    pub project: ProjectArg,

    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Subcommand, Debug)]
pub enum TaskAction {
    /// Create a task
    Create {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Priority (low, medium, high, critical)
        #[arg(long, default_value = "medium")]
        priority: String,

        /// Parent task ID (or unique prefix)
        #[arg(long)]
        parent: Option<String>,

        /// Assigned agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Tags for categorization
        #[arg(short = 'T', long = "tag", action = clap::ArgAction::Append)]
        tags: Vec<String>,

        /// Tasks this one depends on
        #[arg(long = "depends-on", action = clap::ArgAction::Append)]
        depends_on: Vec<String>,
    },

    /// Update task fields
    Update {
        /// Task ID (or unique prefix)
        task_id: String,

        /// New title (renames the task folder)
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New status (pending, in_progress, completed)
        #[arg(short, long)]
        status: Option<String>,

        /// New priority
        #[arg(long)]
        priority: Option<String>,

        /// Assign to an agent
        #[arg(short, long, conflicts_with = "unassign")]
        agent: Option<String>,

        /// Clear the assigned agent
        #[arg(long)]
        unassign: bool,

        /// Add tags
        #[arg(short = 'T', long = "tag", action = clap::ArgAction::Append)]
        add_tags: Vec<String>,

        /// Remove tags
        #[arg(long = "untag", action = clap::ArgAction::Append)]
        remove_tags: Vec<String>,
    },

    /// Mark a task in progress
    Start {
        /// Task ID (or unique prefix)
        task_id: String,
    },

    /// Mark a task completed
    Done {
        /// Task ID (or unique prefix)
        task_id: String,
    },

    /// Move a task (and its subtree) under another task, or to the top level
    Move {
        /// Task ID (or unique prefix)
        task_id: String,

        /// New parent; omit to make the task a root
        #[arg(long)]
        parent: Option<String>,
    },

    /// Delete a task and its subtree
    Delete {
        /// Task ID (or unique prefix)
        task_id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// List tasks
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by agent
        #[arg(short, long)]
        agent: Option<String>,

        /// Filter by tag
        #[arg(short = 'T', long)]
        tag: Option<String>,

        /// Only pending tasks whose dependencies are completed
        #[arg(long, conflicts_with = "blocked")]
        ready: bool,

        /// Only unfinished tasks waiting on a dependency
        #[arg(long)]
        blocked: bool,
    },

    /// Show the task tree
    Tree,

    /// Show task details
    Show {
        /// Task ID (or unique prefix)
        task_id: String,
    },

    /// Print or replace a task's notes
    Notes {
        /// Task ID (or unique prefix)
        task_id: String,

        /// Replace the notes with this text
        #[arg(long, conflicts_with = "from_file")]
        set: Option<String>,

        /// Replace the notes with the contents of a file
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Attach a file to a task, or list its attachments
    Attach {
        /// Task ID (or unique prefix)
        task_id: String,

        /// File to copy into the task's files/ directory
        path: Option<PathBuf>,

        /// Store the attachment under a different name
        #[arg(long)]
        name: Option<String>,

        /// Remove the named attachment instead
        #[arg(long, conflicts_with = "path")]
        remove: Option<String>,
    },

    /// Show or edit a task's dependencies
    Deps {
        /// Task ID (or unique prefix)
        task_id: String,

        /// Add a dependency
        #[arg(long)]
        add: Option<String>,

        /// Remove a dependency
        #[arg(long)]
        remove: Option<String>,
    },

    /// Regenerate every project_data.json document
    Rebuild,
}

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(flatten)]
    pub project: ProjectArg,

    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Add knowledge to the project knowledge base
    Add {
        /// Title
        title: String,

        /// Content
        content: String,

        /// Knowledge type (technical_decision, best_practice, lesson_learned,
        /// context, pattern, gotcha, reference, or any custom kind)
        #[arg(short = 'k', long = "type", default_value = "context")]
        entry_type: String,

        /// Source of the knowledge
        #[arg(short, long)]
        source: Option<String>,

        /// Tags for categorization
        #[arg(short = 'T', long = "tag", action = clap::ArgAction::Append)]
        tags: Vec<String>,
    },

    /// Search title, content and tags
    Search {
        /// Text to look for (case-insensitive)
        query: String,
    },

    /// Link an entry to a task
    Link {
        /// Knowledge entry ID (or unique prefix)
        entry_id: String,

        /// Task ID (or unique prefix)
        task_id: String,

        /// Remove the link instead
        #[arg(long)]
        unlink: bool,
    },

    /// List knowledge entries
    List {
        /// Filter by type
        #[arg(short = 'k', long = "type")]
        entry_type: Option<String>,

        /// Filter by tag
        #[arg(short = 'T', long)]
        tag: Option<String>,

        /// Only entries linked to this task
        #[arg(long)]
        task: Option<String>,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Remove a knowledge entry
    Remove {
        /// Knowledge entry ID (or unique prefix)
        entry_id: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}
