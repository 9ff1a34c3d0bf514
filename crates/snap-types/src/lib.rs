//! Foundation types for the SnapMenu content backend.
//!
//! Every other SnapMenu crate depends on `snap-types`. It holds the pieces
//! that more than one subsystem has to agree on.
//!
//! # Key Types
//!
//! - [`SiteLayout`]: where the live document, backups, menu files and
//!   uploads live under a site root
//! - [`ImageUrl`]: classification of image URLs (local upload vs external)
//! - [`BackupStamp`]: millisecond timestamp used to name backups
//! - [`ContentEvent`]: the real-time message sent to subscribers
//! - [`Advisory`]: outcome of a best-effort side effect

pub mod advisory;
pub mod error;
pub mod event;
pub mod image_url;
pub mod layout;
pub mod stamp;

pub use advisory::Advisory;
pub use error::TypeError;
pub use event::{ContentEvent, CONTENT_UPDATE};
pub use image_url::{filename_from_url, local_image_url, ImageUrl, UPLOAD_URL_PREFIX};
pub use layout::SiteLayout;
pub use stamp::BackupStamp;
