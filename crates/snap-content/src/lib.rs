//! Content persistence for the SnapMenu site.
//!
//! The site content is a single JSON document at
//! `<root>/data/site-content.json`. Every change goes through a verified
//! commit: the previous document is snapshotted into `content-backup/`, the
//! new one is written to a temp file, read back, renamed into place and read
//! back again. A failure at any step puts the latest snapshot back.
//!
//! # Design Rules
//!
//! 1. Readers only ever see a complete document; rename is the only way a
//!    new version becomes visible.
//! 2. One mutating operation takes exactly one backup.
//! 3. Structure and image references are validated before anything is
//!    written.
//! 4. Version control, backup pruning and image collection are advisory:
//!    their failure is logged and reported, never propagated.
//! 5. Mutations are serialized per store.

pub mod backup;
pub mod commit;
pub mod config;
pub mod document;
pub mod error;
pub mod menu;
mod persist;
pub mod store;
pub mod vcs;

pub use backup::{BackupEntry, BackupStore, PruneSummary};
pub use commit::{CommitStage, DocumentFile};
pub use config::{ContentConfig, DEFAULT_KEEP_BACKUPS};
pub use document::{
    collect_image_references, local_image_candidates, render_path, section_path,
    set_nested_value, validate, walk, ImageRef, PathSegment, Visitor,
};
pub use error::{ContentError, ContentResult};
pub use menu::{validate_menu, MenuCategory, MenuData, MenuStore};
pub use store::{CommitReport, ContentStore, SectionUpdate};
pub use vcs::{GitVersionControl, NoVersionControl, VersionControl, DEFAULT_COMMIT_MESSAGE};
