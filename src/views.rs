//! Server-rendered views.
//!
//! Templates are compiled into the binary and served through a single shared
//! `minijinja` environment. `.html` templates are auto-escaped.

use std::sync::LazyLock;

use axum::{
    body::HttpBody as _,
    extract::Request,
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::{context::Locals, error::ErrorReport, error::Result};

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("error.html", include_str!("../templates/error.html")),
    ("listings/index.html", include_str!("../templates/listings/index.html")),
    ("listings/show.html", include_str!("../templates/listings/show.html")),
    ("listings/new.html", include_str!("../templates/listings/new.html")),
    ("listings/edit.html", include_str!("../templates/listings/edit.html")),
    ("users/login.html", include_str!("../templates/users/login.html")),
    ("users/signup.html", include_str!("../templates/users/signup.html")),
];

static ENV: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_loader(|name| {
        Ok(TEMPLATES
            .iter()
            .find(|(template, _)| *template == name)
            .map(|(_, source)| source.to_string()))
    });
    env
});

/// Renders a template with the given context.
pub fn render<S: Serialize>(name: &str, ctx: S) -> Result<Html<String>> {
    let template = ENV.get_template(name)?;
    Ok(Html(template.render(ctx)?))
}

/// render_error_page
///
/// The centralized error handler. Any response that carries an `ErrorReport`
/// and no body yet is replaced by the error page, keeping its status. Responses
/// that already produced a body pass through untouched.
pub async fn render_error_page(locals: Locals, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    if response.body().size_hint().exact() != Some(0) {
        return response;
    }

    if report.status.is_server_error() {
        tracing::error!("{} {}", report.status, report.message);
    } else {
        tracing::warn!("{} {}", report.status, report.message);
    }

    let page = render(
        "error.html",
        context! {
            locals => locals,
            status => report.status.as_u16(),
            message => report.message,
        },
    );

    match page {
        Ok(page) => (report.status, page).into_response(),
        Err(err) => {
            tracing::error!("Failed to render error page: {}", err);
            (report.status, report.message).into_response()
        }
    }
}
