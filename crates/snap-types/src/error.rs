use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("not a local image url: {0}")]
    NotLocalImage(String),

    #[error("unsafe file name in image url: {0}")]
    UnsafeFileName(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
