//! Image storage for the SnapMenu site.
//!
//! Uploaded images live as plain files in the uploads directory and are
//! served under [`UPLOAD_URL_PREFIX`](snap_types::UPLOAD_URL_PREFIX). The
//! store keeps an in-memory set of tracked file names, but the directory
//! listing is always the source of truth: the set is seeded from disk on
//! open and rebuilt on every reconciliation.
//!
//! # Design Rules
//!
//! 1. Uploads are checked for type and size before anything touches disk.
//! 2. A file is only tracked after it has been verified on disk.
//! 3. [`ImageStore::exists`] never fails; any problem means "does not exist".
//! 4. Garbage collection is driven by references computed elsewhere; the
//!    store only deletes what the caller does not list as used.

pub mod error;
pub mod retry;
pub mod store;
pub mod traits;

pub use error::{ImageError, ImageResult};
pub use retry::RetryPolicy;
pub use store::{ImageStore, PruneReport, UploadedImage, ALLOWED_MIME_TYPES, MAX_UPLOAD_BYTES};
pub use traits::ImageCatalog;
