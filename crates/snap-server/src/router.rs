use axum::extract::DefaultBodyLimit;
use axum::http::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use snap_types::UPLOAD_URL_PREFIX;

use crate::handler;
use crate::state::AppState;

/// Headroom on top of the image size cap for multipart framing, so an
/// oversize image is reported by the handler rather than cut off by the
/// body limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the axum router with all SnapMenu endpoints.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let uploads = ServeDir::new(state.images.dir());
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(handler::health))
        .route(
            "/api/content",
            get(handler::get_content).post(handler::save_content),
        )
        .route("/api/content/update-section", post(handler::update_section))
        .route("/api/content/history", get(handler::history))
        .route("/api/content/history/:timestamp", get(handler::get_version))
        .route("/api/content/restore", post(handler::restore))
        .route(
            "/api/content/menu",
            get(handler::get_menu).post(handler::save_menu),
        )
        .route(
            "/api/images/upload",
            post(handler::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/images/verify", get(handler::verify_image))
        .route("/api/images/images", get(handler::list_images))
        .route("/api/images/cleanup", post(handler::cleanup_images))
        .route("/ws", get(handler::ws_handler))
        .nest_service(UPLOAD_URL_PREFIX.trim_end_matches('/'), uploads)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT, CACHE_CONTROL])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}
