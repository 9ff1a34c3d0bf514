/// Errors from image store operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Declared MIME type is not an accepted image format.
    #[error("invalid file type {0}: only JPEG, PNG, GIF and WebP images are allowed")]
    UnsupportedType(String),

    /// Upload exceeds the size limit.
    #[error("file size limit exceeded: {size} bytes, maximum is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    /// The uploaded file could not be confirmed on disk.
    #[error("failed to verify file after {attempts} attempts: {reason}")]
    Verification { attempts: u32, reason: String },

    /// I/O error from the uploads directory.
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for image store operations.
pub type ImageResult<T> = Result<T, ImageError>;
