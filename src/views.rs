//! Server-rendered HTML pages, backed by the askama templates in `templates/`.

use askama::Template;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::Result;
use crate::models::blob::BlobSummary;
use crate::services::auth::{AuthConfig, Locals};

/// Characters left as is when a blob name becomes a path segment.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Body served when even the error template fails to render.
const FALLBACK_ERROR_BODY: &str = "<!DOCTYPE html><html><head><title>Error</title></head><body><h1>Error</h1></body></html>";

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate<'a> {
    title: &'a str,
    errors: &'a [String],
    action: &'a str,
    login_field: &'a str,
    password_field: &'a str,
    login: &'a str,
    submit: &'a str,
    register_path: &'a str,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate<'a> {
    title: &'a str,
    errors: &'a [String],
    action: &'a str,
    login_field: &'a str,
    password_field: &'a str,
    login: &'a str,
    submit: &'a str,
    login_path: &'a str,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate<'a> {
    title: &'a str,
}

#[derive(Template)]
#[template(path = "upload.html")]
struct UploadTemplate<'a> {
    title: &'a str,
}

/// One line of the blob listing.
struct BlobRow {
    name: String,
    segment: String,
    size: u64,
    modified: String,
}

#[derive(Template)]
#[template(path = "display.html")]
struct DisplayTemplate<'a> {
    title: &'a str,
    blobs: Vec<BlobRow>,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    title: &'a str,
}

/// Percent-encodes a blob name for use as a single path segment.
pub fn path_segment(name: &str) -> String {
    utf8_percent_encode(name, PATH_SEGMENT_ENCODE_SET).to_string()
}

/// The login form, with any errors from the previous attempt.
pub fn login_page(
    config: &AuthConfig,
    locals: &Locals,
    errors: &[String],
    login: &str,
) -> Result<String> {
    let page = LoginTemplate {
        title: &locals.title,
        errors,
        action: config.post_login_path,
        login_field: config.login_field,
        password_field: config.password_field,
        login,
        submit: "Login",
        register_path: config.get_register_path,
    };
    Ok(page.render()?)
}

/// The registration form, with any errors from the previous attempt.
pub fn register_page(
    config: &AuthConfig,
    locals: &Locals,
    errors: &[String],
    login: &str,
) -> Result<String> {
    let page = RegisterTemplate {
        title: &locals.title,
        errors,
        action: config.post_register_path,
        login_field: config.login_field,
        password_field: config.password_field,
        login,
        submit: "Register",
        login_path: config.get_login_path,
    };
    Ok(page.render()?)
}

pub fn home_page() -> Result<String> {
    Ok(HomeTemplate { title: "Welcome" }.render()?)
}

pub fn upload_page() -> Result<String> {
    Ok(UploadTemplate {
        title: "Upload File",
    }
    .render()?)
}

/// The listing of stored blobs, each with download and delete actions.
pub fn display_page(blobs: &[BlobSummary]) -> Result<String> {
    let rows = blobs
        .iter()
        .map(|blob| BlobRow {
            name: blob.name.clone(),
            segment: path_segment(&blob.name),
            size: blob.size,
            modified: blob
                .last_modified
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        })
        .collect();

    let page = DisplayTemplate {
        title: "List of Blobs",
        blobs: rows,
    };
    Ok(page.render()?)
}

/// The generic error page. It never carries details of the failure.
pub fn error_page() -> String {
    ErrorTemplate { title: "Error" }.render().unwrap_or_else(|e| {
        tracing::error!("Error page failed to render: {}", e);
        FALLBACK_ERROR_BODY.to_string()
    })
}
