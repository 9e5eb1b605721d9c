//! The filesystem as a work queue.
//!
//! Pending work is whatever `*.pdf` sits in the watch folder; marking a file
//! done renames it into the processed folder. Delivery is at-least-once: a
//! file that was uploaded but not renamed will be uploaded again.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("failed to list {}: {source}", path.display())]
    List {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not pending", .0.display())]
    NotPending(PathBuf),
}

/// Source of files to import and sink for completed ones.
pub trait WorkQueue {
    /// Files waiting to be imported, sorted by path.
    fn pending(&self) -> Result<Vec<PathBuf>, QueueError>;

    /// Mark `path` as imported. Returns where the file now lives.
    fn mark_done(&self, path: &Path) -> Result<PathBuf, QueueError>;

    /// Human-readable location for log lines.
    fn describe(&self) -> String;
}

/// Watch folder / processed folder pair on disk.
#[derive(Debug, Clone)]
pub struct FolderQueue {
    watch: PathBuf,
    processed: PathBuf,
}

impl FolderQueue {
    pub fn new(watch: impl Into<PathBuf>, processed: impl Into<PathBuf>) -> Self {
        Self {
            watch: watch.into(),
            processed: processed.into(),
        }
    }

    pub fn watch_folder(&self) -> &Path {
        &self.watch
    }

    pub fn processed_folder(&self) -> &Path {
        &self.processed
    }
}

/// Non-recursive match for `*.pdf`. The extension match is case-sensitive.
pub fn is_pdf(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "pdf")
}

impl WorkQueue for FolderQueue {
    fn pending(&self) -> Result<Vec<PathBuf>, QueueError> {
        let list_err = |source| QueueError::List {
            path: self.watch.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.watch).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            let path = entry.path();
            if !is_pdf(&path) {
                continue;
            }
            // Follows symlinks, so a linked PDF counts but a folder named x.pdf does not.
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn mark_done(&self, path: &Path) -> Result<PathBuf, QueueError> {
        let name = path
            .file_name()
            .ok_or_else(|| QueueError::NotPending(path.to_path_buf()))?;
        let dest = self.processed.join(name);
        std::fs::rename(path, &dest).map_err(|source| QueueError::Move {
            from: path.to_path_buf(),
            to: dest.clone(),
            source,
        })?;
        Ok(dest)
    }

    fn describe(&self) -> String {
        self.watch.display().to_string()
    }
}

/// In-memory queue for exercising the poller without touching disk.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pending: Mutex<Vec<PathBuf>>,
    done: Mutex<Vec<PathBuf>>,
}

impl MemoryQueue {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            pending: Mutex::new(paths.into_iter().map(Into::into).collect()),
            done: Mutex::new(Vec::new()),
        }
    }

    /// Files marked done so far, in completion order.
    pub fn done(&self) -> Vec<PathBuf> {
        self.done.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Add a file as if it had just been deposited.
    pub fn push(&self, path: impl Into<PathBuf>) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(path.into());
        }
    }
}

impl WorkQueue for MemoryQueue {
    fn pending(&self) -> Result<Vec<PathBuf>, QueueError> {
        let mut files = self
            .pending
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        files.sort();
        Ok(files)
    }

    fn mark_done(&self, path: &Path) -> Result<PathBuf, QueueError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| QueueError::NotPending(path.to_path_buf()))?;
        let idx = pending
            .iter()
            .position(|p| p == path)
            .ok_or_else(|| QueueError::NotPending(path.to_path_buf()))?;
        let moved = pending.remove(idx);
        if let Ok(mut done) = self.done.lock() {
            done.push(moved.clone());
        }
        Ok(moved)
    }

    fn describe(&self) -> String {
        "memory queue".to_string()
    }
}
