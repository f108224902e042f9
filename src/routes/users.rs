use crate::{AppState, guards, handlers};
use axum::{Router, handler::Handler, middleware::from_fn, routing::get};

/// Users Router Module
///
/// Session lifecycle routes. The login submission runs the redirect memory
/// guard so the handler can return the user to where they were turned away.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /signup
        .route("/signup", get(handlers::signup_form).post(handlers::signup))
        // GET/POST /login
        // POST: Redirect Memory
        .route(
            "/login",
            get(handlers::login_form)
                .post(handlers::login.layer(from_fn(guards::save_redirect_url))),
        )
        // GET /logout
        .route("/logout", get(handlers::logout))
}
