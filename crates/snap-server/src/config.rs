use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use snap_content::{ContentConfig, DEFAULT_KEEP_BACKUPS};
use snap_images::MAX_UPLOAD_BYTES;
use snap_notify::{NotifierConfig, DEFAULT_TOKEN};
use snap_types::SiteLayout;

use crate::error::{ServerError, ServerResult};

pub const ENV_ROOT: &str = "SNAPMENU_ROOT";
pub const ENV_BIND: &str = "SNAPMENU_BIND";
pub const ENV_KEEP_BACKUPS: &str = "NUMBER_OF_BACKUPS_TO_KEEP";
pub const ENV_GIT_INTEGRATION: &str = "ENABLE_GIT_INTEGRATION";
pub const ENV_WEBSOCKET_TOKEN: &str = "WEBSOCKET_TOKEN";

/// Origins allowed by default: local dev servers and the hosted admin UI.
const DEFAULT_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:5175",
    "http://localhost:5176",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:5174",
    "http://127.0.0.1:5175",
    "http://127.0.0.1:5176",
    "https://snapmenu.pages.dev",
];

/// Server configuration. Every field has a default, so a TOML file only
/// needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root holding `data/`, `content-backup/` and `uploads/`.
    pub root: PathBuf,
    pub bind_addr: SocketAddr,
    pub keep_backups: usize,
    pub git_integration: bool,
    pub websocket_token: String,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: u64,
    /// Per-subscriber buffer of pending change events.
    pub channel_capacity: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            keep_backups: DEFAULT_KEEP_BACKUPS,
            git_integration: false,
            websocket_token: DEFAULT_TOKEN.to_string(),
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            channel_capacity: NotifierConfig::default().channel_capacity,
        }
    }
}

impl SiteConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would leave the site without a usable backup.
    pub fn validate(&self) -> ServerResult<()> {
        if self.keep_backups == 0 {
            return Err(ServerError::Config(
                "keep_backups must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Values that do not parse are ignored
    /// with a warning.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_ROOT) {
            self.root = PathBuf::from(root);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            match bind.parse() {
                Ok(addr) => self.bind_addr = addr,
                Err(_) => warn!(value = %bind, "ignoring invalid {ENV_BIND}"),
            }
        }
        if let Some(keep) = lookup(ENV_KEEP_BACKUPS) {
            self.keep_backups = match keep.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(value = %keep, "invalid {ENV_KEEP_BACKUPS}, using default");
                    DEFAULT_KEEP_BACKUPS
                }
            };
        }
        if let Some(git) = lookup(ENV_GIT_INTEGRATION) {
            self.git_integration = git.trim().eq_ignore_ascii_case("true");
        }
        if let Some(token) = lookup(ENV_WEBSOCKET_TOKEN) {
            self.websocket_token = token;
        }
        self
    }

    pub fn layout(&self) -> SiteLayout {
        SiteLayout::new(&self.root)
    }

    pub fn content_config(&self) -> ContentConfig {
        ContentConfig {
            keep_backups: self.keep_backups,
            git_integration: self.git_integration,
            ..Default::default()
        }
    }

    pub fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            token: self.websocket_token.clone(),
            channel_capacity: self.channel_capacity,
        }
    }
}
