use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    models::session::{CurrentSession, Session},
    state::AppState,
};

/// The cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Extracts the session token from the request cookies.
///
/// # Returns
///
/// The session token, if the cookie is present and holds a valid UUID.
fn extract_session_token(cookies: &Cookies) -> Option<Uuid> {
    cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Creates the session cookie. It has no max-age, so it ends with the browser session.
pub fn session_cookie(id: Uuid, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, id.to_string());
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_path("/");
    cookie
}

/// A middleware that attaches the caller's session to the request.
///
/// A request without a valid token gets a fresh anonymous session and the
/// cookie for it. Only routed requests pass through here.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The `Response` of the rest of the chain, with a `CurrentSession` made
/// available to it.
pub async fn load_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let existing = match extract_session_token(&cookies) {
        Some(id) => state.sessions.get(&id).await.map(|session| (id, session)),
        None => None,
    };

    let (id, session) = match existing {
        Some(found) => found,
        None => {
            let id = state.sessions.create().await;
            cookies.add(session_cookie(id, state.config.production));
            tracing::debug!("🍪 New session started: {}", id);
            (id, Session::anonymous())
        }
    };

    request.extensions_mut().insert(CurrentSession { id, session });

    next.run(request).await
}
