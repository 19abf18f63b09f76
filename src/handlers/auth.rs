use std::collections::HashMap;

use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use tower_cookies::Cookies;

use crate::{
    error::Result,
    middleware_layer::session::session_cookie,
    models::{session::CurrentSession, user::NewUser},
    services::auth::{self as auth_service, AuthConfig, AuthView, Locals},
    state::AppState,
    views,
};

/// Picks a form field, treating an absent field as empty.
fn field<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or_default()
}

fn render(
    config: &AuthConfig,
    view: AuthView,
    locals: &Locals,
    errors: &[String],
    login: &str,
) -> Result<Html<String>> {
    let page = match view {
        AuthView::Login => views::login_page(config, locals, errors, login)?,
        AuthView::Register => views::register_page(config, locals, errors, login)?,
    };
    Ok(Html(page))
}

/// Binds the caller to `user_id` under a fresh session token.
async fn establish_session(state: &AppState, cookies: &Cookies, current: &CurrentSession, user_id: u64) {
    let id = state.sessions.log_in(&current.id, user_id).await;
    cookies.add(session_cookie(id, state.config.production));
    tracing::info!("✅ Session established for user {}", user_id);
}

/// Renders the login form.
pub async fn login_form(State(state): State<AppState>) -> Result<Html<String>> {
    let auth = &state.auth;
    let locals = (auth.login_locals)(auth.locals_delay).await;
    render(auth, auth.login_view, &locals, &[], "")
}

/// Handles a login attempt.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    cookies: Cookies,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    let auth = &state.auth;
    let login = field(&params, auth.login_field);
    let password = field(&params, auth.password_field);
    tracing::info!("🔐 Login attempt: {}", login);

    match auth_service::login(auth, &state.users, login, password).await {
        Ok(user) => {
            establish_session(&state, &cookies, &current, user.id).await;
            Redirect::to(auth.login_success_redirect).into_response()
        }
        Err(errors) => {
            tracing::warn!("❌ Login failed for '{}': {:?}", login, errors);
            let locals = (auth.login_locals)(auth.locals_delay).await;
            render(auth, auth.login_view, &locals, &errors, login).into_response()
        }
    }
}

/// Renders the registration form.
pub async fn register_form(State(state): State<AppState>) -> Result<Html<String>> {
    let auth = &state.auth;
    let locals = (auth.register_locals)(auth.locals_delay).await;
    render(auth, auth.register_view, &locals, &[], "")
}

/// Handles a registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    cookies: Cookies,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    let auth = &state.auth;
    let new_user = NewUser {
        login: field(&params, auth.login_field).to_string(),
        password: field(&params, auth.password_field).to_string(),
    };
    let login = new_user.login.clone();
    tracing::info!("📝 Register attempt: {}", login);

    match auth_service::register(auth, &state.users, new_user).await {
        Ok(user) => {
            establish_session(&state, &cookies, &current, user.id).await;
            Redirect::to(auth.register_success_redirect).into_response()
        }
        Err(errors) => {
            tracing::warn!("❌ Registration failed for '{}': {:?}", login, errors);
            let locals = (auth.register_locals)(auth.locals_delay).await;
            render(auth, auth.register_view, &locals, &errors, &login).into_response()
        }
    }
}

/// Handles logout. The session stays, but is no longer authenticated.
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Redirect {
    state.sessions.log_out(&current.id).await;
    tracing::info!("👋 Session logged out: {}", current.id);
    Redirect::to(state.auth.logout_redirect)
}
