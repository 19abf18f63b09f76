use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::models::session::CurrentSession;

/// The page unauthenticated requests are sent to.
pub const LOGIN_PATH: &str = "/login";

/// A middleware that lets only logged-in sessions through.
///
/// Anything else is redirected to the login page before the handler runs.
///
/// # Arguments
///
/// * `request` - The incoming request, carrying the `CurrentSession`.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The handler's `Response`, or a redirect to the login page.
pub async fn require_auth(request: Request<Body>, next: Next) -> Response {
    let logged_in = request
        .extensions()
        .get::<CurrentSession>()
        .is_some_and(CurrentSession::is_logged_in);

    if !logged_in {
        tracing::debug!("🔐 Unauthenticated request to {}, redirecting", request.uri().path());
        return Redirect::to(LOGIN_PATH).into_response();
    }

    if let Some(current) = request.extensions().get::<CurrentSession>() {
        tracing::debug!("✅ Session {} authenticated (user {:?})", current.id, current.session.user_id);
    }

    next.run(request).await
}
