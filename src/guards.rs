//! Request guards.
//!
//! Each guard is an `axum::middleware::from_fn` function that either runs the
//! rest of the chain or short-circuits the request. Routes stack them with
//! `tower::ServiceBuilder`, so the declared order is the execution order:
//! identity, then validation, then ownership/authorship.
//!
//! Authentication and ownership failures are resolved here with a flash
//! message and a redirect. Every other failure propagates as an `AppError`
//! to the centralized error page.

use axum::{
    body::{Body, to_bytes},
    extract::{
        FromRequest, MatchedPath, OriginalUri, Path, RawPathParams, Request, State,
        rejection::PathRejection,
    },
    http::{Uri, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, de::DeserializeOwned};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    context::Locals,
    error::{AppError, Result},
    models::{Listing, Review},
    repository::RepositoryState,
    session::{Flash, FlashKind, SessionRedirectUrl},
    validation::Schema,
};

/// Route template shared by every review sub-resource route.
pub const REVIEWS_ROUTE_PREFIX: &str = "/listings/{id}/reviews";

const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

pub const NOT_OWNER_MESSAGE: &str = "You are not the owner of this listing";
pub const NOT_AUTHOR_MESSAGE: &str = "You are not the author of this review";

#[derive(Debug, Deserialize)]
pub struct ListingPath {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPath {
    pub id: Uuid,
    pub review_id: Uuid,
}

/// Turns the locally recoverable denials into a flash message plus redirect.
async fn deny(session: &Session, err: AppError) -> Result<Response> {
    match err {
        AppError::Unauthenticated => {
            Flash::push(session, FlashKind::Error, &err.to_string()).await?;
            Ok(Redirect::to("/login").into_response())
        }
        AppError::Unauthorized {
            redirect_to,
            message,
        } => {
            Flash::push(session, FlashKind::Error, &message).await?;
            Ok(Redirect::to(&redirect_to).into_response())
        }
        other => Err(other),
    }
}

// --- Feature-Flag Defaulter ---

/// set_show_search
///
/// Seeds `show_search = false` for every request. Handlers that want the
/// search box switch it back on.
pub async fn set_show_search(mut request: Request, next: Next) -> Response {
    Locals::update(request.extensions_mut(), |locals| locals.show_search = false);
    next.run(request).await
}

// --- Identity Guard ---

/// remembered_target
///
/// Where to send the caller after they log in. Review sub-resources have no
/// page of their own, so any route under `/listings/{id}/reviews` remembers the
/// parent listing. Everything else remembers the original path and query.
pub fn remembered_target(matched_route: &str, listing_id: Option<&str>, original: &Uri) -> String {
    match listing_id {
        Some(id) if matched_route.starts_with(REVIEWS_ROUTE_PREFIX) => format!("/listings/{}", id),
        _ => original
            .path_and_query()
            .map(|path_and_query| path_and_query.as_str().to_string())
            .unwrap_or_else(|| original.path().to_string()),
    }
}

/// require_login
///
/// Lets authenticated callers through untouched. Anonymous callers get their
/// destination remembered in the session, an error flash, and a redirect to
/// `/login`.
pub async fn require_login(
    locals: Locals,
    session: Session,
    OriginalUri(original): OriginalUri,
    matched: MatchedPath,
    params: RawPathParams,
    request: Request,
    next: Next,
) -> Result<Response> {
    if locals.is_authenticated() {
        return Ok(next.run(request).await);
    }

    let listing_id = params
        .iter()
        .find(|(name, _)| *name == "id")
        .map(|(_, value)| value.to_string());
    let target = remembered_target(matched.as_str(), listing_id.as_deref(), &original);

    tracing::debug!("Anonymous request to {}; remembering {}", original, target);

    SessionRedirectUrl::insert(&session, &target).await?;
    deny(&session, AppError::Unauthenticated).await
}

// --- Redirect Memory ---

/// save_redirect_url
///
/// Copies the remembered destination from the session into the render
/// context. The session value is left in place.
pub async fn save_redirect_url(
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(url) = SessionRedirectUrl::get(&session).await? {
        Locals::update(request.extensions_mut(), |locals| {
            locals.redirect_url = Some(url)
        });
    }

    Ok(next.run(request).await)
}

// --- Ownership / Authorship Guards ---

/// check_listing_owner
///
/// A missing listing is `NotFound`; a listing owned by someone else is
/// `Unauthorized` with a redirect back to the listing page.
pub fn check_listing_owner(
    caller: &AuthUser,
    listing: Option<&Listing>,
    listing_id: Uuid,
) -> Result<()> {
    let listing = listing.ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    if listing.owner_id != caller.id {
        return Err(AppError::Unauthorized {
            redirect_to: format!("/listings/{}", listing_id),
            message: NOT_OWNER_MESSAGE.to_string(),
        });
    }

    Ok(())
}

/// check_review_author
///
/// Like `check_listing_owner`, but for reviews. A review that belongs to a
/// different listing than the routed one is treated as missing. Denials always
/// redirect to the routed parent listing.
pub fn check_review_author(
    caller: &AuthUser,
    review: Option<&Review>,
    listing_id: Uuid,
) -> Result<()> {
    let review = review
        .filter(|review| review.listing_id == listing_id)
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    if review.author_id != caller.id {
        return Err(AppError::Unauthorized {
            redirect_to: format!("/listings/{}", listing_id),
            message: NOT_AUTHOR_MESSAGE.to_string(),
        });
    }

    Ok(())
}

/// require_listing_owner
///
/// Anonymous callers are denied before any lookup. A failed lookup propagates
/// to the error page instead of reading as a missing listing.
pub async fn require_listing_owner(
    State(repo): State<RepositoryState>,
    locals: Locals,
    session: Session,
    path: std::result::Result<Path<ListingPath>, PathRejection>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Ok(Path(ListingPath { id })) = path else {
        return Err(AppError::NotFound("Listing not found".to_string()));
    };

    let outcome = match locals.current_user.as_ref() {
        None => Err(AppError::Unauthenticated),
        Some(caller) => {
            let listing = repo.get_listing(id).await?;
            check_listing_owner(caller, listing.as_ref(), id)
        }
    };

    match outcome {
        Ok(()) => Ok(next.run(request).await),
        Err(err) => {
            tracing::debug!("Ownership check failed for listing {}: {}", id, err);
            deny(&session, err).await
        }
    }
}

/// require_review_author
pub async fn require_review_author(
    State(repo): State<RepositoryState>,
    locals: Locals,
    session: Session,
    path: std::result::Result<Path<ReviewPath>, PathRejection>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Ok(Path(ReviewPath { id, review_id })) = path else {
        return Err(AppError::NotFound("Review not found".to_string()));
    };

    let outcome = match locals.current_user.as_ref() {
        None => Err(AppError::Unauthenticated),
        Some(caller) => {
            let review = repo.get_review(review_id).await?;
            check_review_author(caller, review.as_ref(), id)
        }
    };

    match outcome {
        Ok(()) => Ok(next.run(request).await),
        Err(err) => {
            tracing::debug!("Authorship check failed for review {}: {}", review_id, err);
            deny(&session, err).await
        }
    }
}

// --- Validation Guard ---

/// validate_payload
///
/// Parses the form body as `T` and runs its schema. A rejected payload becomes
/// `AppError::BadRequest` carrying every message. An accepted payload is
/// forwarded byte-for-byte, so the handler reads exactly what was validated.
pub async fn validate_payload<T>(request: Request, next: Next) -> Result<Response>
where
    T: Schema + DeserializeOwned + Send + 'static,
{
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_PAYLOAD_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("Request body could not be read".to_string()))?;

    // Parse a copy through the framework's own form extractor.
    let mut parsed = Request::new(Body::from(bytes.clone()));
    *parsed.method_mut() = parts.method.clone();
    if let Some(content_type) = parts.headers.get(CONTENT_TYPE) {
        parsed.headers_mut().insert(CONTENT_TYPE, content_type.clone());
    }
    let Form(payload) = Form::<T>::from_request(parsed, &())
        .await
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    if let Err(err) = payload.validate() {
        tracing::debug!("{} payload rejected: {}", T::NAME, err.message());
        return Err(err.into());
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
