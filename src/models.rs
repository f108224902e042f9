use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A registered account from the `users` table. The password hash never leaves
/// the server: it is skipped when the struct is serialized into a view.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Listing
///
/// A stay offered on the marketplace. `owner_id` is the identity the
/// ownership guard compares against the caller.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Listing {
    pub id: Uuid,
    // FK to users.id (Owner).
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: i64,
    pub location: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review
///
/// A rating left on a listing. `author_id` is the identity the authorship
/// guard compares against the caller.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Review {
    pub id: Uuid,
    pub listing_id: Uuid,
    // FK to users.id (Author).
    pub author_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// ReviewView
///
/// A review joined with its author's username, as shown on the listing page.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct ReviewView {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

// --- Validated Inputs ---

/// ListingInput
///
/// A listing payload that has passed the listing schema. Produced by
/// `ListingForm::validate`, consumed by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingInput {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: i64,
    pub location: String,
    pub country: String,
}

/// ReviewInput
///
/// A review payload that has passed the review schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInput {
    pub rating: i32,
    pub comment: String,
}

/// NewUser
///
/// Registration data with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

// --- Request Payloads (Form Bodies) ---

/// ListingForm
///
/// Raw body of the new/edit listing forms. Every field is optional text so that
/// a malformed submission still reaches the schema and yields a readable message.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ListingForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
}

/// ReviewForm
///
/// Raw body of the review form on the listing page.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReviewForm {
    pub rating: Option<String>,
    pub comment: Option<String>,
}

/// LoginForm
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// SignupForm
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
}
