use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Room for the multipart envelope and text fields around the payload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Internal
        .route(
            "/_internal/health",
            get(handlers::health)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        // Objects: upload and `?path=` reads at the root
        .route(
            "/",
            get(handlers::read_object)
                .post(handlers::upload_object)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        // Objects: path-as-key reads
        .route(
            "/*key",
            get(handlers::read_object_at_path)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
