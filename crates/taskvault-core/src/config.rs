//! Store configuration.

use serde::{Deserialize, Serialize};

/// Configuration shared by the task and knowledge stores of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum nesting depth of the task tree (root tasks are depth 1).
    ///
    /// Each level adds `<slug>-<id8>/tasks/` to the path, so this keeps paths
    /// well inside common filesystem limits.
    pub max_depth: usize,
    /// Number of knowledge entries included in a project context snapshot.
    pub recent_knowledge_limit: usize,
    /// Take an advisory lock file around every mutation.
    pub file_lock: bool,
    /// fsync temp files before renaming them into place.
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            recent_knowledge_limit: 5,
            file_lock: true,
            fsync: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.recent_knowledge_limit, 5);
        assert!(config.file_lock);
        assert!(config.fsync);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.recent_knowledge_limit, 5);
    }
}
