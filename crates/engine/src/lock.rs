use crate::error::EngineError;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An exclusive advisory lock on a marker file next to the database, held for
/// the duration of a run.
///
/// The operating system releases the lock when the holding process exits, so a
/// run that was killed never blocks the next one. The file itself stays on disk
/// and records the PID of the current holder.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// The lock path for a database file: `<database>.lock`.
    pub fn path_for(database_path: &Path) -> PathBuf {
        let mut name = database_path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    pub fn acquire(database_path: &Path) -> Result<Self, EngineError> {
        let path = Self::path_for(database_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            tracing::debug!(path = %path.display(), error = %e, "Run lock is held elsewhere.");
            return Err(EngineError::RunInProgress(path));
        }

        let mut previous = String::new();
        file.read_to_string(&mut previous)?;
        if !previous.trim().is_empty() {
            tracing::info!(pid = previous.trim(), "Reclaimed run lock left by an earlier process.");
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        tracing::debug!(path = %path.display(), "Acquired run lock.");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Closing the file releases the lock; only the PID needs clearing.
        if let Err(e) = self.file.set_len(0) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to clear run lock.");
        }
    }
}
