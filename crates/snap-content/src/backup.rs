//! Timestamped snapshots of the content document.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use snap_types::BackupStamp;

use crate::error::{ContentError, ContentResult};
use crate::persist::read_json;

const BACKUP_EXTENSION: &str = "json";

/// One stored backup. `timestamp` is the file name without `.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    pub timestamp: String,
    pub path: PathBuf,
}

/// Result of pruning old backups.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PruneSummary {
    pub kept: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Directory of `<timestamp>.json` snapshots.
///
/// Names are unique and strictly increasing for the lifetime of the store,
/// even when several backups land in the same millisecond.
pub struct BackupStore {
    dir: PathBuf,
    last: Mutex<Option<BackupStamp>>,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> ContentResult<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Store `bytes` verbatim under a fresh timestamp.
    pub async fn create(&self, bytes: &[u8]) -> ContentResult<BackupEntry> {
        self.ensure_dir().await?;
        loop {
            let stamp = {
                let mut last = self.last.lock().expect("backup stamp lock poisoned");
                let stamp = BackupStamp::next_after(*last);
                *last = Some(stamp);
                stamp
            };
            let path = self.dir.join(stamp.file_name());
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(stamp = %stamp, "backup name taken, advancing");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let written = async {
                file.write_all(bytes).await?;
                file.sync_all().await
            }
            .await;
            if let Err(e) = written {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %cleanup, "failed to remove partial backup");
                }
                return Err(e.into());
            }
            info!(backup = %stamp, "content backup created");
            return Ok(BackupEntry {
                timestamp: stamp.key(),
                path,
            });
        }
    }

    /// All backups, oldest first. Entries that are not regular `.json`
    /// files are ignored. A missing directory yields an empty list.
    pub async fn list(&self) -> ContentResult<Vec<BackupEntry>> {
        let mut reader = match fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            match entry.file_type().await {
                Ok(kind) if kind.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable backup entry");
                    continue;
                }
            }
            let Some(timestamp) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            entries.push(BackupEntry {
                timestamp: timestamp.to_string(),
                path,
            });
        }
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    /// All backups, newest first.
    pub async fn history(&self) -> ContentResult<Vec<BackupEntry>> {
        let mut entries = self.list().await?;
        entries.reverse();
        Ok(entries)
    }

    pub async fn latest(&self) -> ContentResult<Option<BackupEntry>> {
        Ok(self.list().await?.pop())
    }

    /// Parsed content of the backup named `timestamp`.
    pub async fn read(&self, timestamp: &str) -> ContentResult<Value> {
        let path = self.path_for(timestamp)?;
        read_json(&path).await.map_err(|e| match e {
            ContentError::NotFound(_) => ContentError::NotFound(format!("version {timestamp}")),
            other => other,
        })
    }

    /// Raw bytes of a backup entry.
    pub async fn read_bytes(&self, entry: &BackupEntry) -> ContentResult<Vec<u8>> {
        Ok(fs::read(&entry.path).await?)
    }

    /// Delete the oldest backups so that at most `keep` remain.
    pub async fn prune(&self, keep: usize) -> ContentResult<PruneSummary> {
        let entries = self.list().await?;
        let excess = entries.len().saturating_sub(keep);
        let mut summary = PruneSummary {
            kept: entries.len() - excess,
            ..Default::default()
        };

        for entry in entries.into_iter().take(excess) {
            match fs::remove_file(&entry.path).await {
                Ok(()) => {
                    debug!(backup = %entry.timestamp, "old backup removed");
                    summary.deleted.push(entry.timestamp);
                }
                Err(e) => {
                    warn!(backup = %entry.timestamp, error = %e, "failed to remove old backup");
                    summary.failed.push(entry.timestamp);
                }
            }
        }
        if !summary.deleted.is_empty() {
            info!(deleted = summary.deleted.len(), kept = summary.kept, "backups pruned");
        }
        Ok(summary)
    }

    /// Map a timestamp to its file, refusing anything that could name a
    /// file outside the backup directory.
    fn path_for(&self, timestamp: &str) -> ContentResult<PathBuf> {
        let unsafe_name = timestamp.is_empty()
            || timestamp.contains(['/', '\\'])
            || timestamp.contains("..")
            || timestamp.starts_with('.');
        if unsafe_name {
            return Err(ContentError::NotFound(format!("version {timestamp}")));
        }
        Ok(self.dir.join(format!("{timestamp}.{BACKUP_EXTENSION}")))
    }
}

impl std::fmt::Debug for BackupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupStore").field("dir", &self.dir).finish()
    }
}
