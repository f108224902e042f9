//! Error types for StayQuest

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

/// ErrorKind
///
/// The category of a failure. The centralized error renderer and the guards
/// branch on this rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No authenticated caller: handled locally by redirecting to `/login`.
    Unauthenticated,
    /// The caller does not own/author the resource: handled locally by redirecting.
    Unauthorized,
    /// Payload rejected by a schema.
    BadRequest,
    /// Unmatched route or missing resource.
    NotFound,
    /// Session, database, template or hashing failure.
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("You must be logged in!")]
    Unauthenticated,

    #[error("{message}")]
    Unauthorized { redirect_to: String, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthenticated => ErrorKind::Unauthenticated,
            AppError::Unauthorized { .. } => ErrorKind::Unauthorized,
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Session(_)
            | AppError::Database(_)
            | AppError::Template(_)
            | AppError::PasswordHash(_)
            | AppError::Task(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message safe to show to the user. Internal failures are never echoed.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Something went wrong".to_string(),
            _ => self.to_string(),
        }
    }
}

/// ErrorReport
///
/// Attached to the (still empty) response of a failed request. The centralized
/// renderer in `views::render_error_page` turns it into the error page.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // These are normally resolved by the guards with a flash message. If one
            // escapes, still redirect rather than render.
            AppError::Unauthenticated => Redirect::to("/login").into_response(),
            AppError::Unauthorized { redirect_to, .. } => {
                Redirect::to(&redirect_to).into_response()
            }
            err => {
                let report = ErrorReport {
                    kind: err.kind(),
                    status: err.status_code(),
                    message: err.public_message(),
                };

                if report.kind == ErrorKind::Internal {
                    tracing::error!("Internal server error: {}", err);
                }

                let mut response = report.status.into_response();
                response.extensions_mut().insert(report);
                response
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status_mapping() {
        let err = AppError::BadRequest("\"listing.title\" is required".to_string());
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::NotFound("Page Not Found!".to_string());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "Something went wrong");
    }

    #[test]
    fn test_error_report_attached_for_rendered_kinds() {
        let response = AppError::NotFound("Listing not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.message, "Listing not found");
    }

    #[test]
    fn test_unauthorized_redirects_without_report() {
        let response = AppError::Unauthorized {
            redirect_to: "/listings/42".to_string(),
            message: "You are not the owner of this listing".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/listings/42");
        assert!(response.extensions().get::<ErrorReport>().is_none());
    }
}
