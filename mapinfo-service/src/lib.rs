//! MapInfo Service Library
//!
//! HTTP handlers and types for the map information service.
//! This library is used by both the mapinfo-service binary and integration tests.

pub mod auth;
pub mod handlers;
pub mod tenant;

use std::sync::Arc;

use axum::{
    http::{
        header::{CACHE_CONTROL, EXPIRES, PRAGMA},
        HeaderValue,
    },
    routing::get,
    Router,
};
use mapinfo::MapInfoService;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::tenant::TenantResolver;

/// Application state shared across handlers.
pub struct AppState {
    /// Lookup service for map information queries.
    pub mapinfo_service: MapInfoService,
    /// Maps requests to tenant names.
    pub tenants: TenantResolver,
}

/// Routes of the service without documentation, tracing or CORS layers.
///
/// Responses depend on tenant and caller, so every response is marked as
/// not cacheable.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::get_mapinfo))
        .route("/healthz", get(handlers::healthz))
        .route("/ready", get(handlers::ready))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            EXPIRES,
            HeaderValue::from_static("0"),
        ))
}

// Re-export commonly used types for convenience
pub use handlers::{ErrorResponse, MapInfoResponse, StatusResponse};
