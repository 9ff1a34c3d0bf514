use std::fmt;

/// Outcome of a best-effort side effect.
///
/// Advisory operations (version-control push, backup pruning, image garbage
/// collection) run after the main operation has already succeeded. Their
/// failure is reported here and logged by the caller, never propagated.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Advisory<T> {
    Completed(T),
    Skipped,
    Failed(String),
}

impl<T> Advisory<T> {
    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Emit a warning for a failed outcome and hand the outcome back.
    pub fn log_failure(self, operation: &str) -> Self {
        if let Self::Failed(reason) = &self {
            tracing::warn!(operation, reason = %reason, "advisory operation failed");
        }
        self
    }
}
