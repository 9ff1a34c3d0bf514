//! HTTP and WebSocket server for SnapMenu.
//!
//! Serves the site-content, menu and image endpoints used by the admin UI,
//! the uploaded images themselves, and a token-protected WebSocket that
//! pushes every content change to connected clients.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::SiteConfig;
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::SnapServer;
pub use state::AppState;
