//! Advisory per-project build lock

use crate::error::{BuildError, BuildResult};
use fs4::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file created in the project directory
pub const LOCK_FILE: &str = ".kiln.lock";

/// Exclusive lock on a project directory, released on drop
#[derive(Debug)]
pub struct ProjectLock {
    _file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Take the lock without waiting; fails if another build holds it
    pub fn acquire(project_dir: &Path) -> BuildResult<Self> {
        let path = project_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| BuildError::io(&path, e))?;

        file.try_lock_exclusive()
            .map_err(|_| BuildError::ProjectLocked(project_dir.to_path_buf()))?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
