//! Route modules for Farnsworth Server
//!
//! Layout of the HTTP surface:
//! - `/upload/`, `/dir/`, `/delete/`, `/update/`, `/media/*`: bearer token
//! - `/login/`: Basic credentials
//! - `/health`, `/ffmpeg/*`, `/`: open
//!
//! The dev CORS policy covers the token and login routes only.

pub mod auth;
pub mod health;
pub mod library;
pub mod upload;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

const FALLBACK_DEV_ORIGIN: &str = "http://localhost:3000";

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let config = state.config().clone();

    let protected = Router::new()
        .merge(upload::router(config.server.max_chunk_bytes))
        .merge(library::router())
        .nest_service("/media", ServeDir::new(&config.storage.media_root))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_token,
        ));

    let api = protected.merge(auth::router());
    let api = if config.server.dev_cors {
        tracing::info!(origin = %config.server.dev_origin, "Dev CORS enabled");
        api.layer(dev_cors(&config.server.dev_origin))
    } else {
        api
    };

    Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .nest_service("/ffmpeg", ServeDir::new(&config.server.ffmpeg_dir))
        .fallback_service(ServeDir::new(&config.server.client_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for a client dev server on another origin
fn dev_cors(origin: &str) -> CorsLayer {
    let origin = HeaderValue::from_str(origin).unwrap_or_else(|e| {
        tracing::warn!("Invalid DEV_ORIGIN {}: {}. Using {}", origin, e, FALLBACK_DEV_ORIGIN);
        HeaderValue::from_static(FALLBACK_DEV_ORIGIN)
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(auth::TOKEN_HEADER)])
}
