use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, Method},
    middleware,
};
use time::Duration;
use tower::{ServiceBuilder, util::MapRequest};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;

// The request guards and the schemas they validate against.
pub mod guards;
pub mod validation;

// Server-rendered pages and the centralized error page.
pub mod views;

// Module for routing segregation (Public, Listings, Reviews, Users).
pub mod routes;
use routes::{listings, public, reviews, users};

// --- Public Re-exports ---

pub use config::{AppConfig, Env};
pub use error::{AppError, ErrorKind};
pub use repository::{MockRepository, PostgresRepository, RepositoryState};

/// AppState
///
/// The single, thread-safe container holding the application services and
/// configuration. Shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: listings, reviews and users.
    pub repo: RepositoryState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Handlers and guards pull only the component they need from AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// The full application: method override in front of the router.
pub type App = MapRequest<Router, fn(Request) -> Request>;

/// create_router
///
/// Assembles the routing structure, the session layer and the global
/// middleware, and registers the application state.
pub fn create_router(state: AppState, session_store: MemoryStore) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Session Configuration
    // Cookies are only marked secure in production, where TLS is terminated in front.
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.config.env == Env::Production)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::days(
            state.config.session_ttl_days,
        )));

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(public::public_routes())
        .merge(listings::listing_routes(&state))
        .merge(reviews::review_routes(&state))
        .merge(users::user_routes())
        .fallback(handlers::not_found)
        // A known path with an unsupported method is reported like an unknown path.
        .method_not_allowed_fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                // 2a. Feature flags are seeded before any other application middleware.
                .layer(middleware::from_fn(guards::set_show_search))
                .layer(session_layer)
                // 2b. Current user and flash messages into the render context.
                .layer(middleware::from_fn_with_state(
                    state.repo.clone(),
                    auth::load_locals,
                ))
                // 2c. Centralized error page, innermost so it sees the loaded context.
                .layer(middleware::from_fn(views::render_error_page)),
        )
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router.layer(
        ServiceBuilder::new()
            // 3a. Request ID Generation: a unique UUID for every incoming request.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            // 3b. Request Tracing: the request/response lifecycle in a span carrying the request ID.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // 3c. Request ID Propagation: the x-request-id header is echoed to the client.
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// create_app
///
/// Wraps the router so `?_method=` overrides are applied before routing.
pub fn create_app(state: AppState, session_store: MemoryStore) -> App {
    ServiceBuilder::new()
        .map_request(method_override as fn(Request) -> Request)
        .service(create_router(state, session_store))
}

/// method_override
///
/// HTML forms can only POST. A POST carrying `_method=PUT|PATCH|DELETE` in its
/// query string is dispatched as that method instead.
pub fn method_override(mut request: Request) -> Request {
    if request.method() != Method::POST {
        return request;
    }

    let overridden = request.uri().query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("_method="))
            .and_then(|method| match method.to_ascii_uppercase().as_str() {
                "PUT" => Some(Method::PUT),
                "PATCH" => Some(Method::PATCH),
                "DELETE" => Some(Method::DELETE),
                _ => None,
            })
    });

    if let Some(method) = overridden {
        *request.method_mut() = method;
    }
    request
}

/// trace_span_logger
///
/// Used by `TraceLayer` to create the request span. Every log line for a single
/// request is correlated by its `x-request-id`.
fn trace_span_logger(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn post(uri: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_method_override_put_and_delete() {
        assert_eq!(method_override(post("/listings/1?_method=PUT")).method(), Method::PUT);
        assert_eq!(
            method_override(post("/listings/1?_method=delete")).method(),
            Method::DELETE
        );
    }

    #[test]
    fn test_method_override_ignores_unknown_methods() {
        assert_eq!(method_override(post("/listings/1?_method=GET")).method(), Method::POST);
        assert_eq!(method_override(post("/listings")).method(), Method::POST);
    }

    #[test]
    fn test_method_override_only_applies_to_post() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/listings/1?_method=DELETE")
            .body(Body::empty())
            .unwrap();

        assert_eq!(method_override(request).method(), Method::GET);
    }
}
