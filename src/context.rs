//! Per-request render context.
//!
//! `Locals` is the data every view can read: the display flags, the current
//! caller, the flash messages drained for this request and the remembered
//! post-login destination. It lives in the request extensions so each
//! middleware in the chain can refine it before the handler runs.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::Extensions, http::request::Parts};
use serde::Serialize;

use crate::auth::AuthUser;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Locals {
    /// Whether the layout renders the search box.
    pub show_search: bool,
    /// The authenticated caller, if any.
    pub current_user: Option<AuthUser>,
    pub success: Vec<String>,
    pub error: Vec<String>,
    /// Post-login destination copied from the session by the redirect memory guard.
    pub redirect_url: Option<String>,
}

impl Locals {
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    /// Applies `f` to the request's locals, creating them if no earlier layer did.
    pub fn update(extensions: &mut Extensions, f: impl FnOnce(&mut Locals)) {
        let mut locals = extensions.remove::<Locals>().unwrap_or_default();
        f(&mut locals);
        extensions.insert(locals);
    }
}

impl<S> FromRequestParts<S> for Locals
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Locals>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_creates_missing_locals() {
        let mut extensions = Extensions::new();

        Locals::update(&mut extensions, |locals| locals.show_search = true);

        assert!(extensions.get::<Locals>().unwrap().show_search);
    }

    #[test]
    fn test_update_keeps_other_fields() {
        let mut extensions = Extensions::new();
        extensions.insert(Locals {
            error: vec!["You must be logged in!".to_string()],
            ..Locals::default()
        });

        Locals::update(&mut extensions, |locals| {
            locals.redirect_url = Some("/listings/42".to_string())
        });

        let locals = extensions.get::<Locals>().unwrap();
        assert_eq!(locals.error.len(), 1);
        assert_eq!(locals.redirect_url.as_deref(), Some("/listings/42"));
    }
}
