use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::ImageResult;
use crate::store::PruneReport;

/// Image lookup and collection as seen by the content store.
///
/// Implementations must satisfy these invariants:
/// - `exists` never fails; any error means the image is missing.
/// - `reconcile_and_prune` treats the filesystem as authoritative and only
///   deletes images whose URL is absent from `used`.
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// Whether a local image URL names a readable file.
    async fn exists(&self, url: &str) -> bool;

    /// Rebuild the tracked set from disk and delete unreferenced files.
    async fn reconcile_and_prune(&self, used: &BTreeSet<String>) -> ImageResult<PruneReport>;
}
