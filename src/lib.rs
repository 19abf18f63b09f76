use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod views;

pub mod models {
    pub mod blob;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod blobs;
    pub mod containers;
}

pub mod handlers {
    pub mod auth;
    pub mod blobs;
    pub mod pages;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod session;
}

pub mod validation {
    pub mod auth;
    pub mod upload;
}

use state::AppState;

/// Directory served for any path no route matches.
pub const PUBLIC_DIR: &str = "public";

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    let auth = state.auth.clone();

    let auth_routes = Router::new()
        .route(auth.get_login_path, get(handlers::auth::login_form))
        .route(auth.post_login_path, post(handlers::auth::login))
        .route(auth.get_register_path, get(handlers::auth::register_form))
        .route(auth.post_register_path, post(handlers::auth::register))
        .route(auth.logout_path, get(handlers::auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/", get(handlers::pages::home))
        .route("/Upload", get(handlers::pages::upload_form))
        .route("/Display", get(handlers::blobs::display))
        .route("/Download/{id}", get(handlers::blobs::download))
        .route("/uploadhandler", post(handlers::blobs::upload))
        .route("/Delete/{id}", post(handlers::blobs::delete))
        .route_layer(from_fn(middleware_layer::auth::require_auth))
        .with_state(state.clone());

    // Sessions are only loaded for matched routes; static files and 404s
    // from the fallback never create one.
    Router::new()
        .merge(auth_routes)
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::session::load_session,
        ))
        .fallback_service(ServeDir::new(PUBLIC_DIR))
        .layer(CookieManagerLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
}
