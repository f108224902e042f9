use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable by any caller. Nothing here mutates state.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        .route("/", get(handlers::root))
        // GET /health
        // Used by load balancers; returns "ok" immediately.
        .route("/health", get(handlers::health))
        // GET /listings
        // The index is the only page that shows the search box.
        .route("/listings", get(handlers::index_listings))
        // GET /listings/{id}
        // A missing listing flashes an error and bounces back to the index.
        .route("/listings/{id}", get(handlers::show_listing))
}
