use std::path::PathBuf;

use snap_images::ImageError;

use crate::commit::CommitStage;
use crate::document::ImageRef;

/// Errors from content and menu operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// A document, backup or menu file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A persisted file is not valid JSON or has the wrong shape.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The document violates the expected structure.
    #[error("{0}")]
    Validation(String),

    /// The document references local images that do not exist.
    #[error("Invalid image URLs detected")]
    ImageReferences(Vec<ImageRef>),

    /// Written content did not read back identically.
    #[error("content verification failed: {0}")]
    Verification(String),

    /// A commit failed after it started writing. The live document was
    /// restored from the latest backup when possible.
    #[error("failed to update content file while {stage}: {source}")]
    CommitFailed {
        stage: CommitStage,
        #[source]
        source: Box<ContentError>,
    },

    /// The external version-control step failed.
    #[error("version control error: {0}")]
    VersionControl(String),

    /// Error from the image store.
    #[error("image store error: {0}")]
    Image(#[from] ImageError),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// File system error.
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContentError {
    /// The innermost error, looking through [`ContentError::CommitFailed`].
    pub fn root_cause(&self) -> &ContentError {
        match self {
            Self::CommitFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result alias for content operations.
pub type ContentResult<T> = Result<T, ContentError>;
