use std::sync::Arc;

use tracing::info;

use snap_content::{ContentStore, MenuStore};
use snap_images::ImageStore;
use snap_notify::ChangeNotifier;

use crate::config::SiteConfig;
use crate::error::ServerResult;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SiteConfig>,
    pub content: Arc<ContentStore>,
    pub menu: Arc<MenuStore>,
    pub images: Arc<ImageStore>,
    pub notifier: Arc<ChangeNotifier>,
}

impl AppState {
    /// Open the stores under the configured site root, creating the
    /// uploads and backup directories when missing.
    pub async fn bootstrap(config: SiteConfig) -> ServerResult<Self> {
        let layout = config.layout();

        let images = Arc::new(
            ImageStore::open(layout.uploads_dir())
                .await?
                .with_max_upload_bytes(config.max_upload_bytes),
        );
        let notifier = Arc::new(ChangeNotifier::new(config.notifier_config()));
        let content = ContentStore::new(
            &layout,
            config.content_config(),
            images.clone(),
            notifier.clone(),
        );
        content.init().await?;
        let menu = MenuStore::new(layout.menu_dir());

        info!(
            root = %layout.root().display(),
            tracked_images = images.list_tracked().len(),
            git = config.git_integration,
            "site state ready"
        );

        Ok(Self {
            config: Arc::new(config),
            content: Arc::new(content),
            menu: Arc::new(menu),
            images,
            notifier,
        })
    }
}
