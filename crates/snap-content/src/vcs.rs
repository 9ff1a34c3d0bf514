//! Optional recording of committed content in an external version-control
//! system.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ContentError, ContentResult};

/// Default commit message for content updates.
pub const DEFAULT_COMMIT_MESSAGE: &str = "content: update site content";

/// Records a committed file. Called after the live document has been
/// written and verified; failures are reported but never undo the commit.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn record(&self, path: &Path) -> ContentResult<()>;
}

/// Does nothing.
pub struct NoVersionControl;

#[async_trait]
impl VersionControl for NoVersionControl {
    async fn record(&self, _path: &Path) -> ContentResult<()> {
        Ok(())
    }
}

/// Stages, commits and pushes the file with the `git` binary.
pub struct GitVersionControl {
    workdir: PathBuf,
    message: String,
}

impl GitVersionControl {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    async fn git(&self, args: &[&str]) -> ContentResult<()> {
        debug!(?args, workdir = %self.workdir.display(), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|e| ContentError::VersionControl(format!("failed to run git: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ContentError::VersionControl(format!(
                "git {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[async_trait]
impl VersionControl for GitVersionControl {
    async fn record(&self, path: &Path) -> ContentResult<()> {
        let path = path.to_string_lossy();
        self.git(&["add", &*path]).await?;
        self.git(&["commit", "-m", &self.message]).await?;
        self.git(&["push"]).await?;
        info!(file = %path, "content change pushed to git");
        Ok(())
    }
}
