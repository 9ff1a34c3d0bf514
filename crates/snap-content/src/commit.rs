//! Verified replacement of the live content document.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::error::{ContentError, ContentResult};
use crate::persist::{read_json, read_text, sibling, to_pretty_json, write_atomic};

const TEMP_SUFFIX: &str = ".tmp";
const RESTORE_SUFFIX: &str = ".restore";

/// Progress of a single commit, in the order the stages are entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommitStage {
    Idle,
    BackingUp,
    WritingTemp,
    VerifyingTemp,
    Renaming,
    VerifyingFinal,
    Done,
    Restoring,
    Failed,
}

impl CommitStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BackingUp => "backing up",
            Self::WritingTemp => "writing temp file",
            Self::VerifyingTemp => "verifying temp file",
            Self::Renaming => "renaming",
            Self::VerifyingFinal => "verifying final file",
            Self::Done => "done",
            Self::Restoring => "restoring",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CommitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The live document on disk plus its temp sibling.
#[derive(Clone, Debug)]
pub struct DocumentFile {
    path: PathBuf,
    temp_path: PathBuf,
    /// Called on entering each verification stage with the file about to
    /// be checked.
    #[cfg(test)]
    pub(crate) fault: Option<fn(CommitStage, &Path)>,
}

impl DocumentFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let temp_path = sibling(&path, TEMP_SUFFIX);
        Self {
            path,
            temp_path,
            #[cfg(test)]
            fault: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub async fn read(&self) -> ContentResult<Value> {
        read_json(&self.path).await
    }

    /// Raw text of the live document, or `None` if there is none yet.
    pub async fn read_raw(&self) -> ContentResult<Option<String>> {
        match read_text(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(ContentError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write `doc` to the temp file, check it, rename it over the live file
    /// and check that too. `stage` tracks how far the write got so the
    /// caller can report it on failure. The temp file is removed on error.
    pub async fn write_verified(&self, doc: &Value, stage: &mut CommitStage) -> ContentResult<()> {
        let result = self.write_steps(doc, stage).await;
        if result.is_err() && *stage <= CommitStage::Renaming {
            let _ = fs::remove_file(&self.temp_path).await;
        }
        result
    }

    async fn write_steps(&self, doc: &Value, stage: &mut CommitStage) -> ContentResult<()> {
        let bytes = to_pretty_json(doc)?;

        advance(stage, CommitStage::WritingTemp);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.temp_path, &bytes).await?;

        advance(stage, CommitStage::VerifyingTemp);
        self.inject_fault(*stage, &self.temp_path);
        let written = read_json(&self.temp_path).await.map_err(|e| {
            ContentError::Verification(format!("temp file unreadable: {e}"))
        })?;
        if written != *doc {
            return Err(ContentError::Verification(
                "written content does not match the committed document".into(),
            ));
        }

        advance(stage, CommitStage::Renaming);
        fs::rename(&self.temp_path, &self.path).await?;

        advance(stage, CommitStage::VerifyingFinal);
        self.inject_fault(*stage, &self.path);
        let live = read_json(&self.path).await.map_err(|e| {
            ContentError::Verification(format!("final file unreadable: {e}"))
        })?;
        if live != *doc {
            return Err(ContentError::Verification(
                "final content verification failed".into(),
            ));
        }

        advance(stage, CommitStage::Done);
        Ok(())
    }

    #[cfg(test)]
    fn inject_fault(&self, stage: CommitStage, path: &Path) {
        if let Some(fault) = self.fault {
            fault(stage, path);
        }
    }

    #[cfg(not(test))]
    fn inject_fault(&self, _stage: CommitStage, _path: &Path) {}

    /// Put `bytes` back as the live document without touching the temp path
    /// used by commits.
    pub async fn replace_raw(&self, bytes: &[u8]) -> ContentResult<()> {
        write_atomic(&self.path, bytes, RESTORE_SUFFIX).await
    }
}

fn advance(stage: &mut CommitStage, next: CommitStage) {
    debug!(from = %stage, to = %next, "commit stage");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file() -> (tempfile::TempDir, DocumentFile) {
        let dir = tempfile::tempdir().unwrap();
        let file = DocumentFile::new(dir.path().join("data/site-content.json"));
        (dir, file)
    }

    #[tokio::test]
    async fn write_then_read() {
        let (_dir, file) = file();
        let doc = json!({ "brand": { "name": "A" }, "price": 12.5 });
        let mut stage = CommitStage::Idle;
        file.write_verified(&doc, &mut stage).await.unwrap();
        assert_eq!(stage, CommitStage::Done);
        assert_eq!(file.read().await.unwrap(), doc);
        assert!(!file.temp_path().exists());
    }

    #[tokio::test]
    async fn output_is_pretty_printed() {
        let (_dir, file) = file();
        let mut stage = CommitStage::Idle;
        file.write_verified(&json!({ "a": 1 }), &mut stage).await.unwrap();
        let text = fs::read_to_string(file.path()).await.unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}");
    }

    #[tokio::test]
    async fn failure_reports_stage_and_keeps_live_file() {
        let (_dir, file) = file();
        let mut stage = CommitStage::Idle;
        file.write_verified(&json!({ "v": 1 }), &mut stage).await.unwrap();

        fs::create_dir_all(file.temp_path()).await.unwrap();
        let mut stage = CommitStage::Idle;
        let result = file.write_verified(&json!({ "v": 2 }), &mut stage).await;
        assert!(result.is_err());
        assert_eq!(stage, CommitStage::WritingTemp);
        assert_eq!(file.read().await.unwrap(), json!({ "v": 1 }));
    }

    #[tokio::test]
    async fn read_raw_of_missing_document() {
        let (_dir, file) = file();
        assert_eq!(file.read_raw().await.unwrap(), None);
    }

    #[tokio::test]
    async fn replace_raw_overwrites() {
        let (_dir, file) = file();
        file.replace_raw(br#"{"restored":true}"#).await.unwrap();
        assert_eq!(file.read().await.unwrap(), json!({ "restored": true }));
    }

    #[test]
    fn stages_are_ordered() {
        assert!(CommitStage::WritingTemp < CommitStage::Renaming);
        assert!(CommitStage::VerifyingFinal > CommitStage::Renaming);
        assert_eq!(CommitStage::VerifyingTemp.to_string(), "verifying temp file");
    }
}
