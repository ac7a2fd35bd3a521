//! Cross-process lock around the roaster record.
//!
//! Two invocations racing through load → mutate → save would lose one of the
//! updates, so the file store holds an exclusive advisory lock on a sibling
//! `<state>.lock` file for as long as it is open. The OS drops the lock when
//! the process exits, so a crash never leaves a stale lock behind.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Held exclusive lock; released on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    file: File,
}

impl StateLock {
    /// Block until the lock for `state_path` is held.
    pub fn acquire(state_path: &Path) -> Result<Self> {
        let path = lock_path(state_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        file.lock()
            .with_context(|| format!("lock {}", path.display()))?;
        debug!(path = %path.display(), "state lock acquired");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            debug!(path = %self.path.display(), error = %err, "state unlock failed");
        }
    }
}

fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = state_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "roaster".into());
    name.push(".lock");
    state_path.with_file_name(name)
}
