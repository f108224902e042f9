use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    context::Locals,
    error::{AppError, Result},
    models::User,
    repository::RepositoryState,
    session::{Flash, FlashKind, SessionUserId},
};

/// AuthUser
///
/// The resolved identity of an authenticated caller. Derived per request from
/// the session and read-only to guards and handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Handlers behind the identity guard take `AuthUser` as an argument. The
/// caller was resolved by `load_locals`; an anonymous request is rejected with
/// `AppError::Unauthenticated`, which redirects to the login page.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Locals>()
            .and_then(|locals| locals.current_user.clone())
            .ok_or(AppError::Unauthenticated)
    }
}

/// resolve_current_user
///
/// Looks up the user whose id is stored in the session. A session that points
/// at a user who no longer exists is treated as anonymous and the stale id is
/// dropped. A failed lookup is an error and leaves the session untouched.
pub async fn resolve_current_user(
    repo: &RepositoryState,
    session: &Session,
) -> Result<Option<AuthUser>> {
    let Some(user_id) = SessionUserId::get(session).await? else {
        return Ok(None);
    };

    match repo.get_user(user_id).await? {
        Some(user) => Ok(Some(user.into())),
        None => {
            SessionUserId::remove(session).await?;
            tracing::debug!(
                "Removed user ID {} from session: user not found in database",
                user_id
            );
            Ok(None)
        }
    }
}

/// load_locals
///
/// Global middleware that fills the render context for the rest of the chain:
/// drains both flash queues and resolves the current caller from the session.
pub async fn load_locals(
    State(repo): State<RepositoryState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let current_user = resolve_current_user(&repo, &session).await?;
    let success = Flash::take(&session, FlashKind::Success).await?;
    let error = Flash::take(&session, FlashKind::Error).await?;

    Locals::update(request.extensions_mut(), |locals| {
        locals.success = success;
        locals.error = error;
        locals.current_user = current_user;
    });

    Ok(next.run(request).await)
}

/// start_session
///
/// Logs a user in. Previous session data is dropped and the session id is
/// regenerated so an id issued to an anonymous client is never promoted to an
/// authenticated one.
pub async fn start_session(session: &Session, user_id: Uuid) -> Result<()> {
    regenerate(session).await?;
    SessionUserId::insert(session, user_id).await
}

/// end_session
pub async fn end_session(session: &Session) -> Result<()> {
    regenerate(session).await
}

async fn regenerate(session: &Session) -> Result<()> {
    session.clear().await;
    session.cycle_id().await?;
    Ok(())
}

/// Hashes a password off the async worker threads.
pub async fn hash_password(password: String, cost: u32) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

/// Verifies a password against a stored bcrypt hash off the async worker threads.
pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::repository::MockRepository;

    fn session_test_setup() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_resolve_anonymous_session() {
        let repo: RepositoryState = Arc::new(MockRepository::new());
        let session = session_test_setup();

        let caller = resolve_current_user(&repo, &session).await.unwrap();

        assert!(caller.is_none());
    }

    #[tokio::test]
    async fn test_resolve_logged_in_session() {
        let mock = MockRepository::new();
        let user = mock.seed_user("alice", "alice-password");
        let repo: RepositoryState = Arc::new(mock);
        let session = session_test_setup();
        SessionUserId::insert(&session, user.id).await.unwrap();

        let caller = resolve_current_user(&repo, &session).await.unwrap();

        assert_eq!(
            caller,
            Some(AuthUser {
                id: user.id,
                username: "alice".to_string()
            })
        );
    }

    #[tokio::test]
    /// A session pointing at a deleted user is anonymous and loses the stale id.
    async fn test_resolve_deleted_user_clears_session() {
        let repo: RepositoryState = Arc::new(MockRepository::new());
        let session = session_test_setup();
        SessionUserId::insert(&session, Uuid::new_v4()).await.unwrap();

        let caller = resolve_current_user(&repo, &session).await.unwrap();

        assert!(caller.is_none());
        assert!(SessionUserId::get(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    /// A storage failure is not a missing user: the caller stays logged in.
    async fn test_resolve_keeps_session_when_lookup_fails() {
        let mock = Arc::new(MockRepository::new());
        let user = mock.seed_user("alice", "alice-password");
        mock.set_unavailable(true);
        let repo: RepositoryState = mock.clone();
        let session = session_test_setup();
        SessionUserId::insert(&session, user.id).await.unwrap();

        let result = resolve_current_user(&repo, &session).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(SessionUserId::get(&session).await.unwrap(), Some(user.id));

        mock.set_unavailable(false);
        let caller = resolve_current_user(&repo, &session).await.unwrap();
        assert_eq!(caller.map(|caller| caller.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_start_session_replaces_previous_data() {
        let session = session_test_setup();
        crate::session::SessionRedirectUrl::insert(&session, "/listings/new")
            .await
            .unwrap();
        let user_id = Uuid::new_v4();

        start_session(&session, user_id).await.unwrap();

        assert_eq!(SessionUserId::get(&session).await.unwrap(), Some(user_id));
        assert!(
            crate::session::SessionRedirectUrl::get(&session)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_password_round_trip() {
        let hash = hash_password("s3cret".to_string(), 4).await.unwrap();

        assert!(verify_password("s3cret".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
    }
}
