//! Guardian panic lock.
//!
//! A file-based kill switch: the lock is "on" exactly when the lock file
//! exists, so operators (or another process) can flip it with plain
//! filesystem tools and it survives restarts. The control plane exposes it
//! under `/panic/*`.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Handle to the panic lock file.
#[derive(Debug, Clone)]
pub struct PanicLock {
    path: PathBuf,
}

impl PanicLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Panic is on exactly when the lock file exists.
    pub fn is_active(&self) -> bool {
        self.path.exists()
    }

    /// Create the lock file (with a timestamp for forensics).
    pub fn engage(&self) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, Utc::now().to_rfc3339())
    }

    /// Remove the lock file. Already-absent is not an error.
    pub fn release(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_is_off_without_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock = PanicLock::new(dir.path().join("guardian").join("panic.lock"));
        assert!(!lock.is_active());
    }

    #[test]
    fn panic_turns_on_when_engaged() {
        let dir = tempfile::tempdir().unwrap();
        let lock = PanicLock::new(dir.path().join("guardian").join("panic.lock"));
        lock.engage().unwrap();
        assert!(lock.is_active());
        assert!(lock.path().exists());
    }

    #[test]
    fn panic_turns_off_again_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = PanicLock::new(dir.path().join("guardian").join("panic.lock"));
        lock.engage().unwrap();
        lock.release().unwrap();
        assert!(!lock.is_active());
    }

    #[test]
    fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let lock = PanicLock::new(dir.path().join("panic.lock"));
        lock.release().unwrap();
        lock.release().unwrap();
        assert!(!lock.is_active());
    }

    #[test]
    fn lock_set_by_another_process_is_visible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panic.lock");
        let lock = PanicLock::new(path.clone());
        assert!(!lock.is_active());
        std::fs::write(&path, "panic:on\n").unwrap();
        assert!(lock.is_active());
    }
}
