#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{
        Method,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use stayquest::{
    App, AppConfig, AppState, create_app,
    models::User,
    repository::{MockRepository, RepositoryState},
};
use tower::ServiceExt;
use tower_sessions::MemoryStore;

pub const PASSWORD: &str = "correct-horse";

/// TestApp
///
/// Drives the full application in-process. Behaves like a single browser: the
/// session cookie from the last response is sent with the next request.
pub struct TestApp {
    pub app: App,
    pub repo: Arc<MockRepository>,
    cookie: Option<String>,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(MockRepository::new());
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            config: AppConfig::default(),
        };

        Self {
            app: create_app(state, MemoryStore::default()),
            repo,
            cookie: None,
        }
    }

    /// A second browser against the same application and data.
    pub fn new_client(&self) -> Self {
        Self {
            app: self.app.clone(),
            repo: self.repo.clone(),
            cookie: None,
        }
    }

    pub fn seed_user(&self, username: &str) -> User {
        self.repo.seed_user(username, PASSWORD)
    }

    pub async fn send(&mut self, method: Method, uri: &str, form: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = match pair.split_once('=') {
                Some((_, value)) if !value.is_empty() => Some(pair.to_string()),
                _ => None,
            };
        }

        response
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, form: &str) -> Response {
        self.send(Method::POST, uri, Some(form)).await
    }

    /// A form submission overridden to another method, as the HTML views send it.
    pub async fn post_as(&mut self, method: &str, uri: &str, form: &str) -> Response {
        let separator = if uri.contains('?') { '&' } else { '?' };
        let uri = format!("{}{}_method={}", uri, separator, method);
        self.send(Method::POST, &uri, Some(form)).await
    }

    pub async fn login(&mut self, username: &str) -> Response {
        let form = format!("username={}&password={}", username, PASSWORD);
        self.post("/login", &form).await
    }

    /// Follows up with a GET so the flashes queued by the last response are rendered.
    pub async fn next_page(&mut self, uri: &str) -> String {
        let response = self.get(uri).await;
        body_text(response).await
    }
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn listing_form(title: &str) -> String {
    format!(
        "title={}&description=Quiet+cottage&image=&price=1500&location=Manali&country=India",
        title
    )
}
