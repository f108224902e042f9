use crate::{AppState, guards, handlers, models::ReviewForm};
use axum::{
    Router,
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, post},
};
use tower::ServiceBuilder;

/// Reviews Router Module
///
/// Reviews have no pages of their own. When the identity guard turns an
/// anonymous caller away from any of these routes, it remembers the parent
/// listing rather than the review path.
pub fn review_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // POST /listings/{id}/reviews
        // Identity -> Validation
        .route(
            "/listings/{id}/reviews",
            post(
                handlers::create_review.layer(
                    ServiceBuilder::new()
                        .layer(from_fn(guards::require_login))
                        .layer(from_fn(guards::validate_payload::<ReviewForm>)),
                ),
            ),
        )
        // DELETE /listings/{id}/reviews/{review_id}
        // Identity -> Authorship
        .route(
            "/listings/{id}/reviews/{review_id}",
            delete(
                handlers::delete_review.layer(
                    ServiceBuilder::new()
                        .layer(from_fn(guards::require_login))
                        .layer(from_fn_with_state(state.clone(), guards::require_review_author)),
                ),
            ),
        )
}
