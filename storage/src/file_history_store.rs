//! Append-only JSON-lines leaf history.
//!
//! One entry per line. A torn final line (no trailing newline, e.g. after a
//! crash mid-write) is skipped on read and cut off before the next append, so
//! it can never fuse with a later entry. Any other malformed line is an error.

use crate::error::{StorageError, StorageOperation, StorageResult, StorageResultExt};
use crate::history_backend::LeafHistoryStore;
use parking_lot::Mutex;
use squid_types::LeafHistoryEntry;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
struct Writer {
    file: File,
    /// Set after a failed write; the tail is repaired before the next append.
    dirty: bool,
}

#[derive(Debug)]
pub struct FileLeafHistoryStore {
    path: PathBuf,
    writer: Mutex<Writer>,
}

impl FileLeafHistoryStore {
    /// Open or create the history file. Parent directories are created and a
    /// torn final line is truncated away.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(StorageOperation::Open, parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(StorageOperation::Open, &path)?;
        truncate_torn_tail(&file, &path)?;

        debug!(path = %path.display(), "Opened leaf history file");

        Ok(Self {
            path,
            writer: Mutex::new(Writer { file, dirty: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Cut the file back to its last newline. Returns the number of bytes dropped.
fn truncate_torn_tail(file: &File, path: &Path) -> StorageResult<u64> {
    let content = std::fs::read(path).with_context(StorageOperation::Open, path)?;
    if content.last().map_or(true, |b| *b == b'\n') {
        return Ok(0);
    }

    let keep = content
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos + 1) as u64;
    let dropped = content.len() as u64 - keep;
    file.set_len(keep).with_context(StorageOperation::Open, path)?;

    warn!(path = %path.display(), dropped, "Truncated torn history line");
    Ok(dropped)
}

impl LeafHistoryStore for FileLeafHistoryStore {
    fn append(&self, entry: &LeafHistoryEntry) -> StorageResult<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut writer = self.writer.lock();
        if writer.dirty {
            truncate_torn_tail(&writer.file, &self.path)?;
            writer.dirty = false;
        }

        let file = &mut writer.file;
        let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
        if written.is_err() {
            writer.dirty = true;
        }
        written.with_context(StorageOperation::Append, &self.path)
    }

    fn list_all(&self) -> StorageResult<Vec<LeafHistoryEntry>> {
        // Hold the writer so no append interleaves with the read
        let _guard = self.writer.lock();
        let content =
            std::fs::read_to_string(&self.path).with_context(StorageOperation::Read, &self.path)?;

        let complete = content.ends_with('\n');
        let lines: Vec<&str> = content.lines().collect();
        let mut entries = Vec::with_capacity(lines.len());

        for (number, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LeafHistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) if !complete && number + 1 == lines.len() => {
                    warn!(path = %self.path.display(), error = %e, "Skipping torn history line");
                }
                Err(e) => {
                    return Err(StorageError::Corrupt {
                        path: self.path.clone(),
                        line: number + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }

        entries.reverse();
        Ok(entries)
    }
}
