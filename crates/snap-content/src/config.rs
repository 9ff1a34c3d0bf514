use crate::vcs::DEFAULT_COMMIT_MESSAGE;

/// Default number of backups retained after pruning.
pub const DEFAULT_KEEP_BACKUPS: usize = 10;

/// Behaviour of the content store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentConfig {
    /// Backups retained after each successful commit.
    pub keep_backups: usize,
    /// Record each commit with git.
    pub git_integration: bool,
    /// Message used for git commits.
    pub commit_message: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            keep_backups: DEFAULT_KEEP_BACKUPS,
            git_integration: false,
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }
}
