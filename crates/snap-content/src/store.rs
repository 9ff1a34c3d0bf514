use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use snap_images::{ImageCatalog, PruneReport};
use snap_notify::ChangeNotifier;
use snap_types::{Advisory, ContentEvent, SiteLayout};

use crate::backup::{BackupEntry, BackupStore, PruneSummary};
use crate::commit::{CommitStage, DocumentFile};
use crate::config::ContentConfig;
use crate::document::{
    collect_image_references, local_image_candidates, section_path, set_nested_value, validate,
    ImageRef,
};
use crate::error::{ContentError, ContentResult};
use crate::vcs::{GitVersionControl, NoVersionControl, VersionControl};

/// What a successful commit did besides replacing the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitReport {
    /// Snapshot of the previous document, if there was one.
    pub backup: Option<BackupEntry>,
    pub version_control: Advisory<()>,
    pub pruned: Advisory<PruneSummary>,
}

/// Result of [`ContentStore::update_section`].
#[derive(Clone, Debug)]
pub struct SectionUpdate {
    pub content: Value,
    pub commit: CommitReport,
    /// Subscribers reached by the change notification.
    pub delivered: usize,
    pub cleanup: Advisory<PruneReport>,
}

/// Whether a commit takes its own snapshot or reuses one taken earlier in
/// the same operation.
enum Snapshot {
    Take,
    Taken(Option<BackupEntry>),
}

/// The site-content document with backups, verified commits and change
/// notification.
///
/// Mutating operations hold an async write lock for their whole
/// read-modify-commit sequence.
pub struct ContentStore {
    document: DocumentFile,
    backups: BackupStore,
    images: Arc<dyn ImageCatalog>,
    notifier: Arc<ChangeNotifier>,
    vcs: Arc<dyn VersionControl>,
    config: ContentConfig,
    write_lock: Mutex<()>,
}

impl ContentStore {
    /// `keep_backups` below 1 is raised to 1 so a commit never prunes the
    /// backup it just took.
    pub fn new(
        layout: &SiteLayout,
        mut config: ContentConfig,
        images: Arc<dyn ImageCatalog>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        if config.keep_backups == 0 {
            warn!("keep_backups must be at least 1, keeping one backup");
            config.keep_backups = 1;
        }
        let vcs: Arc<dyn VersionControl> = if config.git_integration {
            Arc::new(
                GitVersionControl::new(layout.root()).with_message(config.commit_message.clone()),
            )
        } else {
            Arc::new(NoVersionControl)
        };
        Self {
            document: DocumentFile::new(layout.content_file()),
            backups: BackupStore::new(layout.backup_dir()),
            images,
            notifier,
            vcs,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_version_control(mut self, vcs: Arc<dyn VersionControl>) -> Self {
        self.vcs = vcs;
        self
    }

    /// Create the backup directory.
    pub async fn init(&self) -> ContentResult<()> {
        self.backups.ensure_dir().await
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub fn document(&self) -> &DocumentFile {
        &self.document
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn read(&self) -> ContentResult<Value> {
        self.document.read().await
    }

    /// Local image references in `doc` that the image catalog does not know.
    pub async fn validate_image_references(&self, doc: &Value) -> Vec<ImageRef> {
        let mut invalid = Vec::new();
        for candidate in local_image_candidates(doc) {
            if !self.images.exists(&candidate.url).await {
                warn!(path = %candidate.path, url = %candidate.url, "image reference not found");
                invalid.push(candidate);
            }
        }
        invalid
    }

    pub async fn history(&self) -> ContentResult<Vec<BackupEntry>> {
        self.backups.history().await
    }

    pub async fn get_version(&self, timestamp: &str) -> ContentResult<Value> {
        self.backups.read(timestamp).await
    }

    /// Local image URLs referenced by the live document.
    pub async fn collect_used_images(&self) -> ContentResult<BTreeSet<String>> {
        Ok(collect_image_references(&self.read().await?))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Replace the live document with `doc`, taking one backup first.
    /// No validation happens here; see [`ContentStore::save`].
    pub async fn commit(&self, doc: &Value) -> ContentResult<CommitReport> {
        let _guard = self.write_lock.lock().await;
        self.commit_locked(doc, Snapshot::Take).await
    }

    /// Validate and commit a whole document, then notify subscribers.
    pub async fn save(&self, doc: Value) -> ContentResult<CommitReport> {
        let _guard = self.write_lock.lock().await;
        validate(&doc)?;
        self.ensure_images_exist(&doc).await?;
        let report = self.commit_locked(&doc, Snapshot::Take).await?;
        self.notifier.broadcast(&ContentEvent::content_update(doc));
        Ok(report)
    }

    /// Set one value inside a section, commit, notify subscribers with the
    /// section, then collect images no longer referenced.
    pub async fn update_section(
        &self,
        section: &str,
        path: &[String],
        value: Value,
    ) -> ContentResult<SectionUpdate> {
        let _guard = self.write_lock.lock().await;

        let mut content = self.document.read().await?;
        let backup = self.snapshot().await?;

        let full_path = section_path(section, path);
        set_nested_value(&mut content, &full_path, value);
        validate(&content)?;
        self.ensure_images_exist(&content).await?;

        let commit = self.commit_locked(&content, Snapshot::Taken(backup)).await?;

        let subtree = content.get(section).cloned().unwrap_or(Value::Null);
        let delivered = self
            .notifier
            .broadcast(&ContentEvent::section_update(section, subtree));
        info!(section, path = %full_path.join("."), delivered, "section updated");

        let cleanup = Advisory::from_result(self.collect_garbage_locked().await)
            .log_failure("image garbage collection");

        Ok(SectionUpdate {
            content,
            commit,
            delivered,
            cleanup,
        })
    }

    /// Make the backup named `timestamp` the live document.
    pub async fn restore(&self, timestamp: &str) -> ContentResult<Value> {
        let _guard = self.write_lock.lock().await;

        let version = self.backups.read(timestamp).await?;
        let backup = self.snapshot().await?;
        self.commit_locked(&version, Snapshot::Taken(backup)).await?;
        info!(version = timestamp, "content restored");

        self.notifier
            .broadcast(&ContentEvent::content_update(version.clone()));
        Ok(version)
    }

    pub async fn prune_backups(&self, keep: usize) -> ContentResult<PruneSummary> {
        self.backups.prune(keep).await
    }

    /// Delete uploaded images the live document no longer references.
    pub async fn garbage_collect_images(&self) -> ContentResult<PruneReport> {
        let _guard = self.write_lock.lock().await;
        self.collect_garbage_locked().await
    }

    // -----------------------------------------------------------------------
    // Internals (write lock held)
    // -----------------------------------------------------------------------

    async fn ensure_images_exist(&self, doc: &Value) -> ContentResult<()> {
        let invalid = self.validate_image_references(doc).await;
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ContentError::ImageReferences(invalid))
        }
    }

    /// Back up the live document, if there is one.
    async fn snapshot(&self) -> ContentResult<Option<BackupEntry>> {
        match self.document.read_raw().await? {
            Some(text) => Ok(Some(self.backups.create(text.as_bytes()).await?)),
            None => {
                debug!(path = %self.document.path().display(), "no live document to back up");
                Ok(None)
            }
        }
    }

    async fn commit_locked(&self, doc: &Value, snapshot: Snapshot) -> ContentResult<CommitReport> {
        let backup = match snapshot {
            Snapshot::Take => self.snapshot().await.map_err(|e| {
                error!(stage = %CommitStage::BackingUp, error = %e, "content backup failed");
                ContentError::CommitFailed {
                    stage: CommitStage::BackingUp,
                    source: Box::new(e),
                }
            })?,
            Snapshot::Taken(backup) => backup,
        };

        let mut stage = CommitStage::Idle;
        if let Err(e) = self.document.write_verified(doc, &mut stage).await {
            error!(stage = %stage, error = %e, "content commit failed");
            self.recover().await;
            return Err(ContentError::CommitFailed {
                stage,
                source: Box::new(e),
            });
        }
        info!(path = %self.document.path().display(), "content committed");

        let version_control = if self.config.git_integration {
            Advisory::from_result(self.vcs.record(self.document.path()).await)
                .log_failure("version control")
        } else {
            Advisory::Skipped
        };
        let pruned = Advisory::from_result(self.backups.prune(self.config.keep_backups).await)
            .log_failure("backup pruning");

        Ok(CommitReport {
            backup,
            version_control,
            pruned,
        })
    }

    /// Put the most recent readable backup back in place after a failed
    /// commit. Backups that do not parse are skipped.
    async fn recover(&self) {
        debug!(stage = %CommitStage::Restoring, "restoring live document from latest backup");
        let result = async {
            for entry in self.backups.history().await? {
                let bytes = self.backups.read_bytes(&entry).await?;
                if let Err(e) = serde_json::from_slice::<Value>(&bytes) {
                    warn!(backup = %entry.timestamp, error = %e, "skipping unparsable backup");
                    continue;
                }
                self.document.replace_raw(&bytes).await?;
                return Ok(Some(entry.timestamp));
            }
            Ok::<_, ContentError>(None)
        }
        .await;

        match result {
            Ok(Some(timestamp)) => info!(backup = %timestamp, "live document restored from backup"),
            Ok(None) => warn!("no usable backup available to restore"),
            Err(e) => error!(
                stage = %CommitStage::Failed,
                error = %e,
                "failed to restore live document from backup"
            ),
        }
    }

    async fn collect_garbage_locked(&self) -> ContentResult<PruneReport> {
        let used = self.collect_used_images().await?;
        let report = self.images.reconcile_and_prune(&used).await?;
        debug!(
            referenced = used.len(),
            deleted = report.deleted.len(),
            "image garbage collection finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("document", &self.document.path())
            .field("backups", &self.backups.dir())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use snap_images::ImageStore;
    use snap_notify::NotifierConfig;

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: SiteLayout,
        images: Arc<ImageStore>,
        notifier: Arc<ChangeNotifier>,
        store: ContentStore,
    }

    async fn fixture_with(config: ContentConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = SiteLayout::new(dir.path());
        let images = Arc::new(ImageStore::open(layout.uploads_dir()).await.unwrap());
        let notifier = Arc::new(ChangeNotifier::new(NotifierConfig::default()));
        let store = ContentStore::new(&layout, config, images.clone(), notifier.clone());
        store.init().await.unwrap();
        Fixture {
            _dir: dir,
            layout,
            images,
            notifier,
            store,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(ContentConfig::default()).await
    }

    async fn upload(images: &ImageStore) -> String {
        images
            .upload(Bytes::from_static(b"png-bytes"), "image/png", "photo.png")
            .await
            .unwrap()
            .url
    }

    fn keys(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Commit and read
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn read_without_document_is_not_found() {
        let f = fixture().await;
        assert!(matches!(f.store.read().await, Err(ContentError::NotFound(_))));
    }

    #[tokio::test]
    async fn commit_then_read_roundtrip() {
        let f = fixture().await;
        let doc = json!({ "brand": { "name": "A" }, "hours": [{ "day": "Mon", "open": 9.5 }] });
        let report = f.store.commit(&doc).await.unwrap();
        assert_eq!(report.backup, None);
        assert_eq!(report.version_control, Advisory::Skipped);
        assert_eq!(f.store.read().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn commit_backs_up_previous_document() {
        let f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        let report = f.store.commit(&json!({ "v": 2 })).await.unwrap();

        let backup = report.backup.unwrap();
        assert_eq!(f.store.get_version(&backup.timestamp).await.unwrap(), json!({ "v": 1 }));
        assert_eq!(f.store.history().await.unwrap(), vec![backup]);
    }

    #[tokio::test]
    async fn history_is_capped_at_keep_backups() {
        let f = fixture_with(ContentConfig {
            keep_backups: 3,
            ..Default::default()
        })
        .await;
        for v in 0..8 {
            f.store.commit(&json!({ "v": v })).await.unwrap();
        }
        let history = f.store.history().await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(f.store.get_version(&history[0].timestamp).await.unwrap(), json!({ "v": 6 }));
        assert_eq!(f.store.get_version(&history[2].timestamp).await.unwrap(), json!({ "v": 4 }));
    }

    #[tokio::test]
    async fn failed_commit_reports_stage_and_keeps_previous_content() {
        let f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();

        tokio::fs::create_dir_all(f.store.document().temp_path())
            .await
            .unwrap();
        let err = f.store.commit(&json!({ "v": 2 })).await.unwrap_err();
        assert!(matches!(err.root_cause(), ContentError::Io(_)));
        match err {
            ContentError::CommitFailed { stage, .. } => assert_eq!(stage, CommitStage::WritingTemp),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.store.read().await.unwrap(), json!({ "v": 1 }));
    }

    fn tear_live_file(stage: CommitStage, path: &Path) {
        if stage == CommitStage::VerifyingFinal {
            std::fs::write(path, "{ torn").unwrap();
        }
    }

    fn tear_temp_file(stage: CommitStage, path: &Path) {
        if stage == CommitStage::VerifyingTemp {
            std::fs::write(path, "[1, 2").unwrap();
        }
    }

    #[tokio::test]
    async fn final_verification_failure_restores_latest_backup() {
        let mut f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        f.store.commit(&json!({ "v": 2 })).await.unwrap();
        f.store.document.fault = Some(tear_live_file);

        let err = f.store.commit(&json!({ "v": 3 })).await.unwrap_err();
        assert!(matches!(err.root_cause(), ContentError::Verification(_)));
        assert!(matches!(
            err,
            ContentError::CommitFailed { stage: CommitStage::VerifyingFinal, .. }
        ));

        let history = f.store.history().await.unwrap();
        let latest = f.store.get_version(&history[0].timestamp).await.unwrap();
        assert_eq!(latest, json!({ "v": 2 }));
        assert_eq!(f.store.read().await.unwrap(), latest);
    }

    #[tokio::test]
    async fn temp_verification_failure_keeps_live_document() {
        let mut f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        f.store.document.fault = Some(tear_temp_file);

        let err = f.store.commit(&json!({ "v": 2 })).await.unwrap_err();
        assert!(matches!(err.root_cause(), ContentError::Verification(_)));
        assert!(matches!(
            err,
            ContentError::CommitFailed { stage: CommitStage::VerifyingTemp, .. }
        ));
        assert!(!f.store.document().temp_path().exists());
        assert_eq!(f.store.read().await.unwrap(), json!({ "v": 1 }));
    }

    #[tokio::test]
    async fn recovery_skips_unparsable_backups() {
        let mut f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        f.store.commit(&json!({ "v": 2 })).await.unwrap();
        tokio::fs::write(
            f.layout.backup_dir().join("9999-12-31T23-59-59-999Z.json"),
            "{ \"v\": 9",
        )
        .await
        .unwrap();
        f.store.document.fault = Some(tear_live_file);

        f.store.commit(&json!({ "v": 3 })).await.unwrap_err();
        assert_eq!(f.store.read().await.unwrap(), json!({ "v": 2 }));
    }

    #[tokio::test]
    async fn zero_keep_backups_still_keeps_one() {
        let f = fixture_with(ContentConfig {
            keep_backups: 0,
            ..Default::default()
        })
        .await;
        assert_eq!(f.store.config().keep_backups, 1);

        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        let report = f.store.commit(&json!({ "v": 2 })).await.unwrap();
        let history = f.store.history().await.unwrap();
        assert_eq!(history, vec![report.backup.unwrap()]);
        assert_eq!(f.store.get_version(&history[0].timestamp).await.unwrap(), json!({ "v": 1 }));
    }

    #[tokio::test]
    async fn concurrent_commits_leave_one_whole_document() {
        let f = fixture().await;
        let d1 = json!({ "writer": 1, "items": (0..50).collect::<Vec<_>>() });
        let d2 = json!({ "writer": 2, "items": (50..100).collect::<Vec<_>>() });
        let (a, b) = tokio::join!(f.store.commit(&d1), f.store.commit(&d2));
        a.unwrap();
        b.unwrap();
        let live = f.store.read().await.unwrap();
        assert!(live == d1 || live == d2);
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_rejects_invalid_structure_without_writing() {
        let f = fixture().await;
        let err = f.store.save(json!({ "brand": "nope" })).await.unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)));
        assert!(!f.layout.content_file().exists());
    }

    #[tokio::test]
    async fn save_rejects_missing_images() {
        let f = fixture().await;
        let err = f
            .store
            .save(json!({ "hero": { "type": "image", "value": "/uploads/images/ghost.png" } }))
            .await
            .unwrap_err();
        match err {
            ContentError::ImageReferences(refs) => {
                assert_eq!(refs.len(), 1);
                assert_eq!(refs[0].path, "hero.value");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn save_broadcasts_whole_document() {
        let f = fixture().await;
        let mut sub = f.notifier.subscribe();
        let url = upload(&f.images).await;
        let doc = json!({ "hero": url, "external": "https://cdn.example.com/x.png" });
        f.store.save(doc.clone()).await.unwrap();
        assert_eq!(sub.next().await.unwrap(), ContentEvent::content_update(doc));
    }

    // -----------------------------------------------------------------------
    // Section updates
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn update_section_sets_value_and_adds_one_backup() {
        let f = fixture().await;
        f.store.commit(&json!({ "brand": { "name": "A" } })).await.unwrap();
        let before = f.store.history().await.unwrap().len();

        let update = f
            .store
            .update_section("brand", &keys(&["name"]), json!("B"))
            .await
            .unwrap();
        assert_eq!(update.content["brand"]["name"], "B");
        assert_eq!(f.store.read().await.unwrap()["brand"]["name"], "B");
        assert_eq!(f.store.history().await.unwrap().len(), before + 1);
    }

    #[tokio::test]
    async fn update_section_accepts_root_paths() {
        let f = fixture().await;
        f.store.commit(&json!({ "brand": { "name": "A" } })).await.unwrap();
        f.store
            .update_section("brand", &keys(&["brand", "tagline"]), json!("Fresh"))
            .await
            .unwrap();
        assert_eq!(
            f.store.read().await.unwrap(),
            json!({ "brand": { "name": "A", "tagline": "Fresh" } })
        );
    }

    #[tokio::test]
    async fn update_section_broadcasts_section_only() {
        let f = fixture().await;
        f.store
            .commit(&json!({ "brand": { "name": "A" }, "about": "x" }))
            .await
            .unwrap();
        let mut sub = f.notifier.subscribe();
        let update = f
            .store
            .update_section("brand", &keys(&["name"]), json!("B"))
            .await
            .unwrap();
        assert_eq!(update.delivered, 1);
        assert_eq!(
            sub.next().await.unwrap(),
            ContentEvent::section_update("brand", json!({ "name": "B" }))
        );
    }

    #[tokio::test]
    async fn update_section_validation_failure_keeps_document() {
        let f = fixture().await;
        let doc = json!({ "navigation": { "links": [] } });
        f.store.commit(&doc).await.unwrap();
        let err = f
            .store
            .update_section("navigation", &keys(&["links"]), json!("not a list"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Navigation links must be an array");
        assert_eq!(f.store.read().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn update_section_collects_replaced_images() {
        let f = fixture().await;
        let old = upload(&f.images).await;
        let new = upload(&f.images).await;
        f.store.save(json!({ "hero": { "image": old.clone() } })).await.unwrap();

        let update = f
            .store
            .update_section("hero", &keys(&["image"]), json!(new.clone()))
            .await
            .unwrap();
        let cleanup = update.cleanup.completed().unwrap();
        assert_eq!(cleanup.deleted.len(), 1);
        assert!(!f.images.exists(&old).await);
        assert!(f.images.exists(&new).await);
    }

    #[tokio::test]
    async fn update_section_rejects_non_canonical_image_urls() {
        let f = fixture().await;
        let url = upload(&f.images).await;
        f.store.save(json!({ "hero": { "image": url.clone() } })).await.unwrap();
        let filename = url.trim_start_matches("/uploads/images/").to_string();
        let aliased = format!("/uploads/images/sub/{filename}");

        let err = f
            .store
            .update_section("hero", &keys(&["image"]), json!(aliased.clone()))
            .await
            .unwrap_err();
        match err {
            ContentError::ImageReferences(refs) => {
                assert_eq!(refs, vec![ImageRef { path: "hero.image".into(), url: aliased }]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(f.images.exists(&url).await);
        assert_eq!(f.store.read().await.unwrap()["hero"]["image"], json!(url));
        assert!(f.store.validate_image_references(&f.store.read().await.unwrap()).await.is_empty());
    }

    #[tokio::test]
    async fn update_section_without_document_is_not_found() {
        let f = fixture().await;
        let err = f
            .store
            .update_section("brand", &keys(&["name"]), json!("B"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    // -----------------------------------------------------------------------
    // History and restore
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn restore_brings_back_version_and_backs_up_current() {
        let f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        let first = f.store.commit(&json!({ "v": 2 })).await.unwrap().backup.unwrap();

        let restored = f.store.restore(&first.timestamp).await.unwrap();
        assert_eq!(restored, json!({ "v": 1 }));
        assert_eq!(f.store.read().await.unwrap(), json!({ "v": 1 }));

        let history = f.store.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(f.store.get_version(&history[0].timestamp).await.unwrap(), json!({ "v": 2 }));
    }

    #[tokio::test]
    async fn restore_unknown_version_is_not_found() {
        let f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        let err = f.store.restore("1999-01-01T00-00-00-000Z").await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_version_rejects_traversal() {
        let f = fixture().await;
        f.store.commit(&json!({ "v": 1 })).await.unwrap();
        let err = f.store.get_version("../data/site-content").await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound(_)));
    }

    // -----------------------------------------------------------------------
    // Version control and garbage collection
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct CountingVcs {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl VersionControl for CountingVcs {
        async fn record(&self, _path: &Path) -> ContentResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ContentError::VersionControl("push rejected".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn version_control_failure_does_not_fail_commit() {
        let f = fixture_with(ContentConfig {
            git_integration: true,
            ..Default::default()
        })
        .await;
        let vcs = Arc::new(CountingVcs {
            fail: true,
            ..Default::default()
        });
        let store = f.store.with_version_control(vcs.clone());

        let report = store.commit(&json!({ "v": 1 })).await.unwrap();
        assert!(report.version_control.is_failed());
        assert_eq!(vcs.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.read().await.unwrap(), json!({ "v": 1 }));
    }

    #[tokio::test]
    async fn version_control_is_skipped_when_disabled() {
        let f = fixture().await;
        let vcs = Arc::new(CountingVcs::default());
        let store = f.store.with_version_control(vcs.clone());
        store.commit(&json!({})).await.unwrap();
        assert_eq!(vcs.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn garbage_collection_keeps_referenced_images() {
        let f = fixture().await;
        let used = upload(&f.images).await;
        let stray = upload(&f.images).await;
        f.store.save(json!({ "gallery": [used.clone()] })).await.unwrap();

        assert_eq!(
            f.store.collect_used_images().await.unwrap(),
            BTreeSet::from([used.clone()])
        );
        let report = f.store.garbage_collect_images().await.unwrap();
        assert_eq!(report.deleted.len(), 1);
        assert!(f.images.exists(&used).await);
        assert!(!f.images.exists(&stray).await);
        assert_eq!(f.images.list_tracked(), vec![used]);
    }
}
