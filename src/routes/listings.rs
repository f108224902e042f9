use crate::{AppState, guards, handlers, models::ListingForm};
use axum::{
    Router,
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower::ServiceBuilder;

/// Listings Router Module
///
/// Every mutating route starts with the identity guard. Routes that touch an
/// existing listing end with the ownership guard; routes that accept a body
/// run the listing schema in between.
pub fn listing_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // POST /listings
        // Identity -> Validation
        .route(
            "/listings",
            post(
                handlers::create_listing.layer(
                    ServiceBuilder::new()
                        .layer(from_fn(guards::require_login))
                        .layer(from_fn(guards::validate_payload::<ListingForm>)),
                ),
            ),
        )
        // GET /listings/new
        // Identity
        .route(
            "/listings/new",
            get(handlers::new_listing_form.layer(from_fn(guards::require_login))),
        )
        // GET /listings/{id}/edit
        // Identity -> Ownership
        .route(
            "/listings/{id}/edit",
            get(
                handlers::edit_listing_form.layer(
                    ServiceBuilder::new()
                        .layer(from_fn(guards::require_login))
                        .layer(from_fn_with_state(state.clone(), guards::require_listing_owner)),
                ),
            ),
        )
        // PUT /listings/{id}
        // Identity -> Validation -> Ownership
        // DELETE /listings/{id}
        // Identity -> Ownership
        .route(
            "/listings/{id}",
            axum::routing::put(
                handlers::update_listing.layer(
                    ServiceBuilder::new()
                        .layer(from_fn(guards::require_login))
                        .layer(from_fn(guards::validate_payload::<ListingForm>))
                        .layer(from_fn_with_state(state.clone(), guards::require_listing_owner)),
                ),
            )
            .delete(
                handlers::delete_listing.layer(
                    ServiceBuilder::new()
                        .layer(from_fn(guards::require_login))
                        .layer(from_fn_with_state(state.clone(), guards::require_listing_owner)),
                ),
            ),
        )
}
