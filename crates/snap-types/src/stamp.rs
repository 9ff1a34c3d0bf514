use std::fmt;

use chrono::{DateTime, Duration, DurationRound, Utc};

/// Millisecond-precision UTC timestamp that names a backup.
///
/// The key form is ISO-8601 with `:` and `.` replaced by `-`, e.g.
/// `2024-03-01T10-15-30-123Z`. Keys are fixed width, so lexicographic order
/// equals chronological order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupStamp(DateTime<Utc>);

const KEY_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

impl BackupStamp {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.duration_trunc(Duration::milliseconds(1)).unwrap_or(at))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// The current time, or one millisecond after `previous` when the clock
    /// has not moved past it.
    pub fn next_after(previous: Option<Self>) -> Self {
        let now = Self::now();
        match previous {
            Some(prev) if now <= prev => prev.succ(),
            _ => now,
        }
    }

    pub fn succ(self) -> Self {
        Self(self.0 + Duration::milliseconds(1))
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn key(&self) -> String {
        self.0.format(KEY_FORMAT).to_string()
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.key())
    }
}

impl fmt::Display for BackupStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
