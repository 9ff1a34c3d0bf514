/// Errors produced by the change notifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Connection token missing or not matching the shared secret.
    #[error("unauthorized")]
    Unauthorized,

    /// The subscription has been dropped by the notifier.
    #[error("subscription closed")]
    Closed,
}

/// Convenience alias used throughout the notify crate.
pub type Result<T> = std::result::Result<T, NotifyError>;
