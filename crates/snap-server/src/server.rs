use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// SnapMenu content server.
pub struct SnapServer {
    config: SiteConfig,
}

impl SnapServer {
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Open the site stores and build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<Router> {
        let state = AppState::bootstrap(self.config.clone()).await?;
        Ok(build_router(state))
    }

    /// Start serving requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            root = %self.config.root.display(),
            "SnapMenu server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = SnapServer::new(SiteConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:3030".parse::<std::net::SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn router_builds_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let server = SnapServer::new(SiteConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        });
        let _router = server.router().await.unwrap();
        let layout = server.config().layout();
        assert!(layout.uploads_dir().is_dir());
        assert!(layout.backup_dir().is_dir());
    }
}
