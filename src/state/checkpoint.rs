//! Durable per-shard progress marker
//!
//! The checkpoint file holds a single integer: the next worklist index this shard has
//! not yet attempted. It is rewritten after every resolved index through a temp file
//! in the same directory plus a rename, so a reader sees either the old value or the
//! new one and never a torn write.

use crate::ReelError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Durable "next unattempted index" for one shard
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    current: usize,
}

impl CheckpointStore {
    /// Opens the checkpoint at `path`
    ///
    /// When no file exists the store starts at `default_start` without writing anything.
    /// A file that exists but does not hold a non-negative integer is an error: guessing
    /// would risk either skipping or redoing a large part of the worklist.
    pub fn load(path: impl Into<PathBuf>, default_start: usize) -> Result<Self, ReelError> {
        let path = path.into();

        let current = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let trimmed = content.trim();
                trimmed
                    .parse::<usize>()
                    .map_err(|_| ReelError::CorruptCheckpoint {
                        path: path.clone(),
                        content: trimmed.to_string(),
                    })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "No checkpoint at {}, starting at {}",
                    path.display(),
                    default_start
                );
                default_start
            }
            Err(source) => return Err(ReelError::Checkpoint { path, source }),
        };

        Ok(Self { path, current })
    }

    /// The next index not yet attempted
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if `index` was already resolved by an earlier run or step
    pub fn is_done(&self, index: usize) -> bool {
        index < self.current
    }

    /// Durably records `next` as the next unattempted index
    ///
    /// The write is complete (data synced, rename done) when this returns. Values
    /// below the current checkpoint are refused so the marker never moves backwards.
    pub fn persist(&mut self, next: usize) -> Result<(), ReelError> {
        if next < self.current {
            tracing::warn!(
                "Refusing to move checkpoint {} back from {} to {}",
                self.path.display(),
                self.current,
                next
            );
            return Ok(());
        }

        self.write_atomically(next)
            .map_err(|source| ReelError::Checkpoint {
                path: self.path.clone(),
                source,
            })?;
        self.current = next;
        Ok(())
    }

    fn write_atomically(&self, value: usize) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(value.to_string().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Deletes the checkpoint at `path`, returning whether one existed
    pub fn clear(path: &Path) -> Result<bool, ReelError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ReelError::Checkpoint {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
