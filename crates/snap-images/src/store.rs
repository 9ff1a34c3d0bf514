use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use snap_types::{filename_from_url, local_image_url};

use crate::error::{ImageError, ImageResult};
use crate::retry::RetryPolicy;
use crate::traits::ImageCatalog;

/// Largest accepted upload (5 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Declared MIME types accepted for upload.
pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// How many generated names to try before giving up on a collision.
const NAME_ATTEMPTS: u32 = 5;

/// A stored and verified upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedImage {
    /// Public URL, always `/uploads/images/<filename>`.
    pub url: String,
    /// Generated file name inside the uploads directory.
    pub filename: String,
}

/// Outcome of a reconcile-and-prune pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Regular files found in the directory.
    pub scanned: usize,
    /// File names removed because nothing referenced them.
    pub deleted: Vec<String>,
    /// File names that should have been removed but could not be.
    pub failed: Vec<String>,
}

/// Filesystem-backed image store.
///
/// The tracked set holds file names (not URLs) and is a cache over the
/// uploads directory. It is only trusted after [`ImageStore::open`] or
/// [`ImageStore::reconcile_and_prune`] has rebuilt it from a listing.
pub struct ImageStore {
    dir: PathBuf,
    tracked: RwLock<BTreeSet<String>>,
    retry: RetryPolicy,
    max_upload_bytes: u64,
}

impl ImageStore {
    /// Open the store, creating the directory if needed and seeding the
    /// tracked set from its current contents.
    pub async fn open(dir: impl Into<PathBuf>) -> ImageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let store = Self {
            dir,
            tracked: RwLock::new(BTreeSet::new()),
            retry: RetryPolicy::default(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        };

        let files = store.scan_files().await?;
        info!(dir = %store.dir.display(), count = files.len(), "image store opened");
        *store.tracked.write().expect("lock poisoned") = files;
        Ok(store)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Lower the upload cap. Values above [`MAX_UPLOAD_BYTES`] are clamped.
    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max.min(MAX_UPLOAD_BYTES);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Store an uploaded image under a generated name and verify it landed.
    pub async fn upload(
        &self,
        data: Bytes,
        declared_mime: &str,
        declared_name: &str,
    ) -> ImageResult<UploadedImage> {
        if !ALLOWED_MIME_TYPES.contains(&declared_mime) {
            return Err(ImageError::UnsupportedType(declared_mime.to_string()));
        }
        let size = data.len() as u64;
        if size > self.max_upload_bytes {
            return Err(ImageError::TooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }

        let (filename, path) = self.write_new_file(&data, declared_name).await?;
        self.verify_upload(&path, size).await?;

        self.tracked
            .write()
            .expect("lock poisoned")
            .insert(filename.clone());

        let url = local_image_url(&filename);
        info!(url = %url, size, "image uploaded");
        Ok(UploadedImage { url, filename })
    }

    /// Confirm a freshly written upload is a readable regular file of the
    /// expected length, retrying per the store's policy. A file that never
    /// verifies is removed.
    async fn verify_upload(&self, path: &Path, expected_len: u64) -> ImageResult<()> {
        let verified = self
            .retry
            .run(|attempt| async move {
                debug!(attempt, path = %path.display(), "verifying upload");
                let len = verify_readable_file(path).await?;
                if len == expected_len {
                    Ok(())
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("expected {expected_len} bytes, found {len}"),
                    ))
                }
            })
            .await;
        match verified {
            Ok(()) => Ok(()),
            Err((attempts, e)) => {
                discard(path).await;
                Err(ImageError::Verification {
                    attempts,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Whether `url` names a readable regular file in the uploads directory.
    pub async fn exists(&self, url: &str) -> bool {
        let filename = match filename_from_url(url) {
            Ok(name) => name,
            Err(e) => {
                debug!(url, error = %e, "rejecting image url");
                return false;
            }
        };
        match verify_readable_file(&self.dir.join(filename)).await {
            Ok(_) => true,
            Err(e) => {
                debug!(url, error = %e, "image not available");
                false
            }
        }
    }

    /// Tracked image URLs, sorted. May lag behind the directory until the
    /// next reconciliation.
    pub fn list_tracked(&self) -> Vec<String> {
        self.tracked
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|name| local_image_url(name))
            .collect()
    }

    /// Rebuild the tracked set from the directory listing, then delete every
    /// file whose URL is not in `used`.
    ///
    /// Per-file deletion failures are logged and reported, not returned as
    /// errors. Only a failure to list the directory is an error.
    pub async fn reconcile_and_prune(&self, used: &BTreeSet<String>) -> ImageResult<PruneReport> {
        fs::create_dir_all(&self.dir).await?;
        let files = self.scan_files().await?;
        *self.tracked.write().expect("lock poisoned") = files.clone();

        let mut report = PruneReport {
            scanned: files.len(),
            ..Default::default()
        };

        for name in files {
            if used.contains(&local_image_url(&name)) {
                continue;
            }
            match fs::remove_file(self.dir.join(&name)).await {
                Ok(()) => {
                    self.tracked.write().expect("lock poisoned").remove(&name);
                    debug!(file = %name, "deleted unused image");
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "failed to delete unused image");
                    report.failed.push(name);
                }
            }
        }

        info!(
            scanned = report.scanned,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "image cleanup complete"
        );
        Ok(report)
    }

    /// Regular files currently in the uploads directory.
    async fn scan_files(&self) -> io::Result<BTreeSet<String>> {
        let mut files = BTreeSet::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, "skipping non UTF-8 file name");
                    continue;
                }
            };
            match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => {
                    files.insert(name);
                }
                Ok(_) => warn!(file = %name, "skipping entry that is not a regular file"),
                Err(e) => warn!(file = %name, error = %e, "skipping unreadable entry"),
            }
        }
        Ok(files)
    }

    /// Create the upload file under a fresh name and write `data` to it.
    async fn write_new_file(&self, data: &[u8], declared_name: &str) -> ImageResult<(String, PathBuf)> {
        let mut last_err = None;
        for _ in 0..NAME_ATTEMPTS {
            let filename = generate_filename(declared_name);
            let path = self.dir.join(&filename);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(file = %filename, "generated name collided");
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let written = async {
                file.write_all(data).await?;
                file.sync_all().await
            }
            .await;
            if let Err(e) = written {
                drop(file);
                discard(&path).await;
                return Err(e.into());
            }
            return Ok((filename, path));
        }
        Err(last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"))
            .into())
    }
}

#[async_trait]
impl ImageCatalog for ImageStore {
    async fn exists(&self, url: &str) -> bool {
        ImageStore::exists(self, url).await
    }

    async fn reconcile_and_prune(&self, used: &BTreeSet<String>) -> ImageResult<PruneReport> {
        ImageStore::reconcile_and_prune(self, used).await
    }
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.tracked.read().map(|t| t.len()).unwrap_or_default();
        f.debug_struct("ImageStore")
            .field("dir", &self.dir)
            .field("tracked", &count)
            .finish()
    }
}

/// `<unixMillis>-<random 0..1e9><ext>`, keeping the declared extension.
fn generate_filename(declared_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let random: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{millis}-{random}{}", extension_of(declared_name))
}

/// The declared extension with its dot, or empty. Only alphanumeric
/// extensions are kept.
fn extension_of(declared_name: &str) -> String {
    Path::new(declared_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Remove a partially stored upload. Failures are logged only.
async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove unverified upload");
        }
    }
}

/// Exists, is a regular file, and opens for reading. Returns the size.
async fn verify_readable_file(path: &Path) -> io::Result<u64> {
    let meta = fs::metadata(path).await?;
    if !meta.is_file() {
        return Err(io::Error::new(io::ErrorKind::Other, "not a regular file"));
    }
    drop(File::open(path).await?);
    Ok(meta.len())
}
