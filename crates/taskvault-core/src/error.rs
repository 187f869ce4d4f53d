//! Error types for taskvault-core.

use thiserror::Error;

/// Result type alias using taskvault-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for task and knowledge operations
#[derive(Error, Debug)]
pub enum Error {
    // Lookup errors
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Parent task not found: {0}")]
    ParentNotFound(String),

    // Validation errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Dependency cycle: {task_id} cannot depend on {depends_on}")]
    DependencyCycle { task_id: String, depends_on: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl Error {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Task",
            id: id.into(),
        }
    }

    pub fn project_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Project",
            id: name.into(),
        }
    }

    pub fn entry_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Knowledge entry",
            id: id.into(),
        }
    }

    pub fn file_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "File",
            id: name.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// True for any of the `NotFound` variants.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::ParentNotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::task_not_found("abc");
        assert_eq!(err.to_string(), "Task not found: abc");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parent_not_found_is_not_found() {
        assert!(Error::ParentNotFound("p".into()).is_not_found());
        assert!(!Error::invalid("bad").is_not_found());
    }
}
