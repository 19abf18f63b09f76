use axum::response::Html;

use crate::{error::Result, views};

pub async fn home() -> Result<Html<String>> {
    Ok(Html(views::home_page()?))
}

pub async fn upload_form() -> Result<Html<String>> {
    Ok(Html(views::upload_page()?))
}
