use axum::{
    Form,
    extract::{Path, State, rejection::PathRejection},
    response::{Html, IntoResponse, Redirect, Response},
};
use minijinja::context;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    auth::{self, AuthUser},
    config::AppConfig,
    context::Locals,
    error::{AppError, Result},
    guards::{ListingPath, ReviewPath},
    models::{ListingForm, LoginForm, NewUser, ReviewForm, SignupForm},
    repository::RepositoryState,
    session::{Flash, FlashKind},
    validation::Schema,
    views,
};

const DEFAULT_LOGIN_REDIRECT: &str = "/listings";

// Flashes a message and redirects. Every mutating handler ends this way.
async fn flash_redirect(
    session: &Session,
    kind: FlashKind,
    message: &str,
    to: &str,
) -> Result<Response> {
    Flash::push(session, kind, message).await?;
    Ok(Redirect::to(to).into_response())
}

// --- Misc ---

pub async fn root() -> &'static str {
    "StayQuest backend is running"
}

pub async fn health() -> &'static str {
    "ok"
}

/// Fallback for every unmatched route or method.
pub async fn not_found() -> AppError {
    AppError::NotFound("Page Not Found!".to_string())
}

// --- Listings ---

/// index_listings
///
/// The only page that turns the search box on.
pub async fn index_listings(
    State(repo): State<RepositoryState>,
    mut locals: Locals,
) -> Result<Html<String>> {
    locals.show_search = true;
    let listings = repo.get_listings().await?;

    views::render(
        "listings/index.html",
        context! { locals => locals, listings => listings },
    )
}

/// new_listing_form
///
/// [Identity] Renders the empty listing form.
pub async fn new_listing_form(locals: Locals) -> Result<Html<String>> {
    views::render("listings/new.html", context! { locals => locals })
}

/// create_listing
///
/// [Identity -> Validation] The payload was already accepted by the listing
/// schema; re-running it here only converts the form into typed input.
pub async fn create_listing(
    State(repo): State<RepositoryState>,
    AuthUser { id: owner_id, .. }: AuthUser,
    session: Session,
    Form(form): Form<ListingForm>,
) -> Result<Response> {
    let input = form.validate()?;

    let listing = repo.create_listing(input, owner_id).await?;

    tracing::info!("Listing {} created by {}", listing.id, owner_id);

    flash_redirect(&session, FlashKind::Success, "New Listing Created!", "/listings").await
}

/// show_listing
///
/// Public detail page. A missing (or malformed) id is not an error page: the
/// visitor is sent back to the index with a flash.
pub async fn show_listing(
    State(repo): State<RepositoryState>,
    locals: Locals,
    session: Session,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Response> {
    let listing = match path {
        Ok(Path(id)) => repo.get_listing(id).await?,
        Err(_) => None,
    };
    let Some(listing) = listing else {
        return flash_redirect(
            &session,
            FlashKind::Error,
            "Listing you requested for does not exist!",
            "/listings",
        )
        .await;
    };

    let reviews = repo.get_reviews(listing.id).await?;
    let owner_username = repo
        .get_user(listing.owner_id)
        .await?
        .map(|owner| owner.username)
        .unwrap_or_default();
    let is_owner = locals
        .current_user
        .as_ref()
        .is_some_and(|caller| caller.id == listing.owner_id);

    let page = views::render(
        "listings/show.html",
        context! {
            locals => locals,
            listing => listing,
            reviews => reviews,
            owner_username => owner_username,
            is_owner => is_owner,
        },
    )?;

    Ok(page.into_response())
}

/// edit_listing_form
///
/// [Identity -> Ownership]
pub async fn edit_listing_form(
    State(repo): State<RepositoryState>,
    locals: Locals,
    Path(ListingPath { id }): Path<ListingPath>,
) -> Result<Html<String>> {
    let listing = repo
        .get_listing(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    views::render(
        "listings/edit.html",
        context! { locals => locals, listing => listing },
    )
}

/// update_listing
///
/// [Identity -> Validation -> Ownership]
pub async fn update_listing(
    State(repo): State<RepositoryState>,
    session: Session,
    Path(ListingPath { id }): Path<ListingPath>,
    Form(form): Form<ListingForm>,
) -> Result<Response> {
    let input = form.validate()?;

    repo.update_listing(id, input)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    flash_redirect(
        &session,
        FlashKind::Success,
        "Listing Updated!",
        &format!("/listings/{}", id),
    )
    .await
}

/// delete_listing
///
/// [Identity -> Ownership] Reviews of the listing go with it.
pub async fn delete_listing(
    State(repo): State<RepositoryState>,
    session: Session,
    Path(ListingPath { id }): Path<ListingPath>,
) -> Result<Response> {
    if !repo.delete_listing(id).await? {
        return Err(AppError::NotFound("Listing not found".to_string()));
    }

    tracing::info!("Listing {} deleted", id);

    flash_redirect(&session, FlashKind::Success, "Listing Deleted!", "/listings").await
}

// --- Reviews ---

/// create_review
///
/// [Identity -> Validation]
pub async fn create_review(
    State(repo): State<RepositoryState>,
    AuthUser { id: author_id, .. }: AuthUser,
    session: Session,
    path: std::result::Result<Path<ListingPath>, PathRejection>,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let Ok(Path(ListingPath { id })) = path else {
        return Err(AppError::NotFound("Listing not found".to_string()));
    };
    let input = form.validate()?;

    repo.create_review(id, author_id, input)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;

    flash_redirect(
        &session,
        FlashKind::Success,
        "New Review Created!",
        &format!("/listings/{}", id),
    )
    .await
}

/// delete_review
///
/// [Identity -> Authorship]
pub async fn delete_review(
    State(repo): State<RepositoryState>,
    session: Session,
    Path(ReviewPath { id, review_id }): Path<ReviewPath>,
) -> Result<Response> {
    if !repo.delete_review(id, review_id).await? {
        return Err(AppError::NotFound("Review not found".to_string()));
    }

    flash_redirect(
        &session,
        FlashKind::Success,
        "Review Deleted!",
        &format!("/listings/{}", id),
    )
    .await
}

// --- Users ---

pub async fn signup_form(locals: Locals) -> Result<Html<String>> {
    views::render("users/signup.html", context! { locals => locals })
}

/// signup
///
/// Registers a user and logs them straight in.
pub async fn signup(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let username = form.username.trim().to_string();
    if username.is_empty() || form.password.is_empty() {
        return flash_redirect(
            &session,
            FlashKind::Error,
            "Username and password are required.",
            "/signup",
        )
        .await;
    }

    let password_hash = auth::hash_password(form.password, config.password_cost).await?;
    let new_user = NewUser {
        username,
        email: form.email.trim().to_string(),
        password_hash,
    };

    let Some(user) = repo.create_user(new_user).await? else {
        return flash_redirect(
            &session,
            FlashKind::Error,
            "A user with the given username is already registered",
            "/signup",
        )
        .await;
    };

    tracing::info!("User {} signed up", user.id);

    auth::start_session(&session, user.id).await?;
    flash_redirect(&session, FlashKind::Success, "Welcome to StayQuest!", "/listings").await
}

pub async fn login_form(locals: Locals) -> Result<Html<String>> {
    views::render("users/login.html", context! { locals => locals })
}

/// login
///
/// [Redirect Memory] Verifies credentials, then sends the user to the
/// destination they were turned away from, or to the listings index.
pub async fn login(
    State(repo): State<RepositoryState>,
    locals: Locals,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let user = repo.find_user_by_username(form.username.trim()).await?;
    let verified = match &user {
        Some(user) => auth::verify_password(form.password, user.password_hash.clone()).await?,
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        tracing::debug!("Failed login attempt for {}", form.username);
        return flash_redirect(
            &session,
            FlashKind::Error,
            "Invalid username or password.",
            "/login",
        )
        .await;
    };

    // Only local absolute paths are honoured.
    let target = locals
        .redirect_url
        .filter(|url| url.starts_with('/') && !url.starts_with("//"))
        .unwrap_or_else(|| DEFAULT_LOGIN_REDIRECT.to_string());

    auth::start_session(&session, user.id).await?;

    tracing::info!("User {} logged in", user.id);

    flash_redirect(&session, FlashKind::Success, "Welcome back to StayQuest!", &target).await
}

/// logout
pub async fn logout(session: Session) -> Result<Response> {
    auth::end_session(&session).await?;
    flash_redirect(&session, FlashKind::Success, "You are logged out!", "/listings").await
}
