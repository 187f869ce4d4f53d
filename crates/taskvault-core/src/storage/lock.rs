//! Advisory per-project lock file.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::error::Result;

use super::layout::LOCK_FILE;

/// Exclusive lock on `<project>/.taskvault.lock`, released on drop.
///
/// Serializes writers across processes sharing one project directory.
pub struct ProjectLock {
    file: Option<File>,
}

impl ProjectLock {
    /// Block until the lock is held. A disabled lock is a no-op guard.
    pub fn acquire(project_dir: &Path, enabled: bool) -> Result<Self> {
        if !enabled {
            return Ok(Self { file: None });
        }

        let path = project_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        debug!(path = %path.display(), "acquired project lock");
        Ok(Self { file: Some(file) })
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_reacquire_after_drop() {
        let dir = tempdir().unwrap();
        {
            let _guard = ProjectLock::acquire(dir.path(), true).unwrap();
            assert!(dir.path().join(LOCK_FILE).exists());
        }
        let _again = ProjectLock::acquire(dir.path(), true).unwrap();
    }

    #[test]
    fn test_disabled_lock_creates_nothing() {
        let dir = tempdir().unwrap();
        let _guard = ProjectLock::acquire(dir.path(), false).unwrap();
        assert!(!dir.path().join(LOCK_FILE).exists());
    }
}
