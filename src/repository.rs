use crate::models::{Listing, ListingInput, NewUser, Review, ReviewInput, ReviewView, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Result of a repository call. `Err` is always a storage failure; a row that
/// does not exist is `Ok(None)` (or `Ok(false)` for deletes).
pub type RepoResult<T> = std::result::Result<T, sqlx::Error>;

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers and guards only
/// see this trait, so the Postgres implementation can be swapped for the
/// in-memory `MockRepository` in tests.
///
/// Lookups return `Option`: callers must branch on absence before reading
/// `owner_id` / `author_id`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Listings ---
    async fn get_listings(&self) -> RepoResult<Vec<Listing>>;
    async fn get_listing(&self, id: Uuid) -> RepoResult<Option<Listing>>;
    async fn create_listing(&self, input: ListingInput, owner_id: Uuid) -> RepoResult<Listing>;
    async fn update_listing(&self, id: Uuid, input: ListingInput) -> RepoResult<Option<Listing>>;
    // Removes the listing together with its reviews.
    async fn delete_listing(&self, id: Uuid) -> RepoResult<bool>;

    // --- Reviews ---
    async fn get_reviews(&self, listing_id: Uuid) -> RepoResult<Vec<ReviewView>>;
    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>>;
    // Returns None when the listing does not exist.
    async fn create_review(
        &self,
        listing_id: Uuid,
        author_id: Uuid,
        input: ReviewInput,
    ) -> RepoResult<Option<Review>>;
    async fn delete_review(&self, listing_id: Uuid, id: Uuid) -> RepoResult<bool>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // Returns None when the username is already taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<Option<User>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Query failures are logged here and returned to the caller.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LISTING_COLUMNS: &str = "id, owner_id, title, description, image_url, price, location, country, created_at, updated_at";

// Logs a failed query under the operation's name before handing the error back.
fn logged(operation: &'static str) -> impl FnOnce(sqlx::Error) -> sqlx::Error {
    move |e| {
        tracing::error!("{} error: {:?}", operation, e);
        e
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_listings(&self) -> RepoResult<Vec<Listing>> {
        let query = format!("SELECT {} FROM listings ORDER BY created_at DESC", LISTING_COLUMNS);

        sqlx::query_as::<_, Listing>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("get_listings"))
    }

    async fn get_listing(&self, id: Uuid) -> RepoResult<Option<Listing>> {
        let query = format!("SELECT {} FROM listings WHERE id = $1", LISTING_COLUMNS);

        sqlx::query_as::<_, Listing>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_listing"))
    }

    async fn create_listing(&self, input: ListingInput, owner_id: Uuid) -> RepoResult<Listing> {
        let query = format!(
            "INSERT INTO listings (id, owner_id, title, description, image_url, price, location, country, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING {}",
            LISTING_COLUMNS
        );

        sqlx::query_as::<_, Listing>(&query)
            .bind(Uuid::new_v4())
            .bind(owner_id)
            .bind(input.title)
            .bind(input.description)
            .bind(input.image_url)
            .bind(input.price)
            .bind(input.location)
            .bind(input.country)
            .fetch_one(&self.pool)
            .await
            .map_err(logged("create_listing"))
    }

    /// update_listing
    ///
    /// Replaces the editable fields. An empty image keeps the current one.
    async fn update_listing(&self, id: Uuid, input: ListingInput) -> RepoResult<Option<Listing>> {
        let query = format!(
            "UPDATE listings SET title = $2, description = $3, image_url = COALESCE($4, image_url), \
             price = $5, location = $6, country = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            LISTING_COLUMNS
        );

        sqlx::query_as::<_, Listing>(&query)
            .bind(id)
            .bind(input.title)
            .bind(input.description)
            .bind(input.image_url)
            .bind(input.price)
            .bind(input.location)
            .bind(input.country)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("update_listing"))
    }

    /// delete_listing
    ///
    /// Reviews go with the listing through `ON DELETE CASCADE`.
    async fn delete_listing(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(logged("delete_listing"))?;

        Ok(res.rows_affected() > 0)
    }

    async fn get_reviews(&self, listing_id: Uuid) -> RepoResult<Vec<ReviewView>> {
        sqlx::query_as::<_, ReviewView>(
            r#"
            SELECT r.id, r.listing_id, r.author_id, u.username AS author_username,
                   r.rating, r.comment, r.created_at
            FROM reviews r
            JOIN users u ON r.author_id = u.id
            WHERE r.listing_id = $1
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await
        .map_err(logged("get_reviews"))
    }

    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>> {
        sqlx::query_as::<_, Review>(
            "SELECT id, listing_id, author_id, rating, comment, created_at FROM reviews WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(logged("get_review"))
    }

    /// create_review
    ///
    /// Inserts nothing when the listing is gone, so a missing parent is
    /// `Ok(None)` rather than a foreign key violation.
    async fn create_review(
        &self,
        listing_id: Uuid,
        author_id: Uuid,
        input: ReviewInput,
    ) -> RepoResult<Option<Review>> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, listing_id, author_id, rating, comment, created_at)
            SELECT $1, l.id, $3, $4, $5, NOW()
            FROM listings l
            WHERE l.id = $2
            RETURNING id, listing_id, author_id, rating, comment, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(listing_id)
        .bind(author_id)
        .bind(input.rating)
        .bind(input.comment)
        .fetch_optional(&self.pool)
        .await
        .map_err(logged("create_review"))
    }

    async fn delete_review(&self, listing_id: Uuid, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM reviews WHERE id = $1 AND listing_id = $2")
            .bind(id)
            .bind(listing_id)
            .execute(&self.pool)
            .await
            .map_err(logged("delete_review"))?;

        Ok(res.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, username, email, password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_user"))
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(logged("find_user_by_username"))
    }

    /// create_user
    ///
    /// `ON CONFLICT DO NOTHING` turns a duplicate username into `Ok(None)`.
    async fn create_user(&self, user: NewUser) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, email, password_hash
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(logged("create_user"))
    }
}

// --- In-Memory Implementation (For Tests) ---

#[derive(Default)]
struct MockData {
    users: HashMap<Uuid, User>,
    listings: HashMap<Uuid, Listing>,
    reviews: HashMap<Uuid, Review>,
}

/// MockRepository
///
/// An in-memory implementation of `Repository` used by unit and integration
/// tests, so the guard chain can be exercised without a database.
/// `set_unavailable(true)` makes every trait call fail like a lost connection.
#[derive(Default)]
pub struct MockRepository {
    data: RwLock<MockData>,
    unavailable: AtomicBool,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, MockData>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.data.read().map_err(|_| sqlx::Error::PoolClosed)
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, MockData>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.data.write().map_err(|_| sqlx::Error::PoolClosed)
    }

    /// Inserts a user whose password is hashed at the lowest bcrypt cost.
    pub fn seed_user(&self, username: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@stayquest.test", username),
            password_hash: bcrypt::hash(password, 4).unwrap_or_default(),
        };
        if let Ok(mut data) = self.data.write() {
            data.users.insert(user.id, user.clone());
        }
        user
    }

    /// Inserts a listing owned by `owner_id`.
    pub fn seed_listing(&self, owner_id: Uuid, title: &str) -> Listing {
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
            description: format!("{} description", title),
            image_url: None,
            price: 1200,
            location: "Goa".to_string(),
            country: "India".to_string(),
            created_at: now,
            updated_at: now,
        };
        if let Ok(mut data) = self.data.write() {
            data.listings.insert(listing.id, listing.clone());
        }
        listing
    }

    /// Inserts a review on `listing_id` written by `author_id`.
    pub fn seed_review(&self, listing_id: Uuid, author_id: Uuid, rating: i32) -> Review {
        let review = Review {
            id: Uuid::new_v4(),
            listing_id,
            author_id,
            rating,
            comment: "Lovely stay".to_string(),
            created_at: Utc::now(),
        };
        if let Ok(mut data) = self.data.write() {
            data.reviews.insert(review.id, review.clone());
        }
        review
    }

    pub fn listing_count(&self) -> usize {
        self.data.read().map(|data| data.listings.len()).unwrap_or(0)
    }

    pub fn review_count(&self) -> usize {
        self.data.read().map(|data| data.reviews.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_listings(&self) -> RepoResult<Vec<Listing>> {
        let data = self.read()?;
        let mut listings: Vec<Listing> = data.listings.values().cloned().collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    async fn get_listing(&self, id: Uuid) -> RepoResult<Option<Listing>> {
        Ok(self.read()?.listings.get(&id).cloned())
    }

    async fn create_listing(&self, input: ListingInput, owner_id: Uuid) -> RepoResult<Listing> {
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4(),
            owner_id,
            title: input.title,
            description: input.description,
            image_url: input.image_url,
            price: input.price,
            location: input.location,
            country: input.country,
            created_at: now,
            updated_at: now,
        };
        self.write()?.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn update_listing(&self, id: Uuid, input: ListingInput) -> RepoResult<Option<Listing>> {
        let mut data = self.write()?;
        let Some(listing) = data.listings.get_mut(&id) else {
            return Ok(None);
        };
        listing.title = input.title;
        listing.description = input.description;
        if input.image_url.is_some() {
            listing.image_url = input.image_url;
        }
        listing.price = input.price;
        listing.location = input.location;
        listing.country = input.country;
        listing.updated_at = Utc::now();
        Ok(Some(listing.clone()))
    }

    async fn delete_listing(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.write()?;
        let removed = data.listings.remove(&id).is_some();
        if removed {
            data.reviews.retain(|_, review| review.listing_id != id);
        }
        Ok(removed)
    }

    async fn get_reviews(&self, listing_id: Uuid) -> RepoResult<Vec<ReviewView>> {
        let data = self.read()?;
        let mut reviews: Vec<ReviewView> = data
            .reviews
            .values()
            .filter(|review| review.listing_id == listing_id)
            .map(|review| ReviewView {
                id: review.id,
                listing_id: review.listing_id,
                author_id: review.author_id,
                author_username: data
                    .users
                    .get(&review.author_id)
                    .map(|user| user.username.clone())
                    .unwrap_or_default(),
                rating: review.rating,
                comment: review.comment.clone(),
                created_at: review.created_at,
            })
            .collect();
        reviews.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reviews)
    }

    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>> {
        Ok(self.read()?.reviews.get(&id).cloned())
    }

    async fn create_review(
        &self,
        listing_id: Uuid,
        author_id: Uuid,
        input: ReviewInput,
    ) -> RepoResult<Option<Review>> {
        let mut data = self.write()?;
        if !data.listings.contains_key(&listing_id) {
            return Ok(None);
        }
        let review = Review {
            id: Uuid::new_v4(),
            listing_id,
            author_id,
            rating: input.rating,
            comment: input.comment,
            created_at: Utc::now(),
        };
        data.reviews.insert(review.id, review.clone());
        Ok(Some(review))
    }

    async fn delete_review(&self, listing_id: Uuid, id: Uuid) -> RepoResult<bool> {
        let mut data = self.write()?;
        let belongs = data
            .reviews
            .get(&id)
            .is_some_and(|review| review.listing_id == listing_id);
        if belongs {
            data.reviews.remove(&id);
        }
        Ok(belongs)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<Option<User>> {
        let mut data = self.write()?;
        if data.users.values().any(|u| u.username == user.username) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
        };
        data.users.insert(user.id, user.clone());
        Ok(Some(user))
    }
}
