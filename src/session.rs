//! Session data models.
//!
//! Type-safe wrappers for the values StayQuest keeps in the per-client session:
//! the logged-in user id, the remembered post-login destination and the one-shot
//! flash queues. Each wrapper owns one namespaced key.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::Result;

pub const SESSION_USER_ID_KEY: &str = "stayquest:user:id";
pub const SESSION_REDIRECT_URL_KEY: &str = "stayquest:redirect_url";

/// Session wrapper for the authenticated user's id.
#[derive(Default, Deserialize, Serialize, Debug)]
pub struct SessionUserId(pub Uuid);

impl SessionUserId {
    /// Insert user ID into session
    pub async fn insert(session: &Session, user_id: Uuid) -> Result<()> {
        session
            .insert(SESSION_USER_ID_KEY, SessionUserId(user_id))
            .await?;

        Ok(())
    }

    /// Get user ID from session
    pub async fn get(session: &Session) -> Result<Option<Uuid>> {
        Ok(session
            .get::<SessionUserId>(SESSION_USER_ID_KEY)
            .await?
            .map(|SessionUserId(id)| id))
    }

    /// Remove user ID from session
    pub async fn remove(session: &Session) -> Result<()> {
        session.remove::<SessionUserId>(SESSION_USER_ID_KEY).await?;

        Ok(())
    }
}

/// Session wrapper for the remembered post-login destination.
///
/// Written by the identity guard when it turns an anonymous caller away, read by
/// the redirect memory guard on the login submission. Concurrent requests from
/// one client race on this value; the last write wins.
#[derive(Default, Deserialize, Serialize, Debug)]
pub struct SessionRedirectUrl(pub String);

impl SessionRedirectUrl {
    pub async fn insert(session: &Session, url: &str) -> Result<()> {
        session
            .insert(SESSION_REDIRECT_URL_KEY, SessionRedirectUrl(url.to_string()))
            .await?;

        Ok(())
    }

    /// Reads the remembered destination without consuming it.
    pub async fn get(session: &Session) -> Result<Option<String>> {
        Ok(session
            .get::<SessionRedirectUrl>(SESSION_REDIRECT_URL_KEY)
            .await?
            .map(|SessionRedirectUrl(url)| url)
            .filter(|url| !url.is_empty()))
    }
}

/// FlashKind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    fn session_key(self) -> &'static str {
        match self {
            FlashKind::Success => "stayquest:flash:success",
            FlashKind::Error => "stayquest:flash:error",
        }
    }
}

/// Flash
///
/// One-shot messages queued in the session. `push` appends to the queue of a
/// kind; `take` drains it, so each message is rendered exactly once.
pub struct Flash;

impl Flash {
    pub async fn push(session: &Session, kind: FlashKind, message: &str) -> Result<()> {
        let mut queue = session
            .get::<Vec<String>>(kind.session_key())
            .await?
            .unwrap_or_default();
        queue.push(message.to_string());
        session.insert(kind.session_key(), queue).await?;

        Ok(())
    }

    pub async fn take(session: &Session, kind: FlashKind) -> Result<Vec<String>> {
        Ok(session
            .remove::<Vec<String>>(kind.session_key())
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::{MemoryStore, Session};
    use uuid::Uuid;

    use super::*;

    /// Creates a [`Session`] instance used for session-related tests
    fn session_test_setup() -> Session {
        let store = Arc::new(MemoryStore::default());
        Session::new(None, store, None)
    }

    mod user_id {
        use super::*;

        #[tokio::test]
        /// Expect Some when user ID is present in session
        async fn test_get_session_user_id_some() {
            let session = session_test_setup();
            let user_id = Uuid::new_v4();
            SessionUserId::insert(&session, user_id).await.unwrap();

            let result = SessionUserId::get(&session).await.unwrap();

            assert_eq!(result, Some(user_id));
        }

        #[tokio::test]
        /// Expect None when no user ID is present in session
        async fn test_get_session_user_id_none() {
            let session = session_test_setup();

            let result = SessionUserId::get(&session).await.unwrap();

            assert!(result.is_none());
        }

        #[tokio::test]
        async fn test_remove_session_user_id() {
            let session = session_test_setup();
            SessionUserId::insert(&session, Uuid::new_v4()).await.unwrap();

            SessionUserId::remove(&session).await.unwrap();

            assert!(SessionUserId::get(&session).await.unwrap().is_none());
        }
    }

    mod redirect_url {
        use super::*;

        #[tokio::test]
        /// Reading the remembered destination does not consume it.
        async fn test_get_does_not_clear() {
            let session = session_test_setup();
            SessionRedirectUrl::insert(&session, "/listings/42").await.unwrap();

            let first = SessionRedirectUrl::get(&session).await.unwrap();
            let second = SessionRedirectUrl::get(&session).await.unwrap();

            assert_eq!(first.as_deref(), Some("/listings/42"));
            assert_eq!(second.as_deref(), Some("/listings/42"));
        }

        #[tokio::test]
        /// The latest remembered destination overwrites the previous one.
        async fn test_last_write_wins() {
            let session = session_test_setup();
            SessionRedirectUrl::insert(&session, "/listings/new").await.unwrap();
            SessionRedirectUrl::insert(&session, "/listings/7/edit")
                .await
                .unwrap();

            let result = SessionRedirectUrl::get(&session).await.unwrap();

            assert_eq!(result.as_deref(), Some("/listings/7/edit"));
        }

        #[tokio::test]
        async fn test_empty_value_reads_as_none() {
            let session = session_test_setup();
            SessionRedirectUrl::insert(&session, "").await.unwrap();

            assert!(SessionRedirectUrl::get(&session).await.unwrap().is_none());
        }
    }

    mod flash {
        use super::*;

        #[tokio::test]
        /// Messages are returned in order and only once.
        async fn test_take_drains_queue() {
            let session = session_test_setup();
            Flash::push(&session, FlashKind::Error, "first").await.unwrap();
            Flash::push(&session, FlashKind::Error, "second").await.unwrap();

            let drained = Flash::take(&session, FlashKind::Error).await.unwrap();
            let again = Flash::take(&session, FlashKind::Error).await.unwrap();

            assert_eq!(drained, vec!["first".to_string(), "second".to_string()]);
            assert!(again.is_empty());
        }

        #[tokio::test]
        async fn test_kinds_are_separate_queues() {
            let session = session_test_setup();
            Flash::push(&session, FlashKind::Success, "saved").await.unwrap();

            let errors = Flash::take(&session, FlashKind::Error).await.unwrap();
            let successes = Flash::take(&session, FlashKind::Success).await.unwrap();

            assert!(errors.is_empty());
            assert_eq!(successes, vec!["saved".to_string()]);
        }
    }
}
