use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::{
    error::{AppError, Result},
    services::blobs::DEFAULT_CONTENT_TYPE,
    state::AppState,
    validation::upload::{download_file_name, validate_item_name},
    views,
};

/// Capacity of the pipe between the storage stream and the response body.
const STREAM_BUFFER_BYTES: usize = 64 * 1024;
/// How many leading bytes are kept for content sniffing.
const SNIFF_BYTES: usize = 8192;
/// Where a successful upload or delete lands.
const DISPLAY_PATH: &str = "/Display";

/// An uploaded file spooled to a temp file, removed when dropped.
struct SpooledUpload {
    file: NamedTempFile,
    original_name: String,
    content_type: String,
}

/// Streams one multipart file field into a temp file under `dir`.
async fn spool(dir: &FsPath, mut field: Field<'_>) -> Result<SpooledUpload> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let declared_type = field
        .content_type()
        .filter(|t| !t.is_empty() && *t != DEFAULT_CONTENT_TYPE)
        .map(str::to_string);

    let temp = tempfile::Builder::new().prefix("upload-").tempfile_in(dir)?;
    let mut file = tokio::fs::File::from_std(temp.reopen()?);
    let mut head = Vec::with_capacity(SNIFF_BYTES);
    let mut size = 0usize;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Multipart(format!("uploadedFile: {}", e)))?
    {
        if head.len() < SNIFF_BYTES {
            let take = (SNIFF_BYTES - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        file.write_all(&chunk).await?;
        size += chunk.len();
    }
    file.flush().await?;

    let content_type = declared_type
        .or_else(|| infer::get(&head).map(|kind| kind.mime_type().to_string()))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    tracing::debug!(
        "📥 Spooled upload '{}' ({} bytes, {}) to {}",
        original_name,
        size,
        content_type,
        temp.path().display()
    );

    Ok(SpooledUpload {
        file: temp,
        original_name,
        content_type,
    })
}

/// Lists the blobs in the container.
///
/// A listing failure is not turned into the error page; the request simply fails.
pub async fn display(State(state): State<AppState>) -> std::result::Result<Html<String>, StatusCode> {
    let blobs = state.blobs.list().await.map_err(|e| {
        tracing::error!("❌ Listing blobs failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let page = views::display_page(&blobs).map_err(|e| {
        tracing::error!("❌ Rendering blob listing failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Html(page))
}

/// Streams one blob back as an attachment.
///
/// Once headers are sent, a failed transfer is only logged and the body ends early.
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let properties = state.blobs.get_properties(&id).await?;
    let file_name = properties.file_name.unwrap_or_else(|| id.clone());

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&properties.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename={}", file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    let (writer, reader) = tokio::io::duplex(STREAM_BUFFER_BYTES);
    let gateway = state.blobs.clone();
    tokio::spawn(async move {
        match gateway.stream_to(&id, writer).await {
            Ok(bytes) => tracing::debug!("✅ Download of {} finished ({} bytes)", id, bytes),
            Err(e) => tracing::error!("❌ Download of {} failed mid-stream: {}", id, e),
        }
    });

    Ok((headers, Body::from_stream(ReaderStream::new(reader))).into_response())
}

/// Accepts the upload form and stores the file under the item name.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Redirect> {
    let mut item_name = String::new();
    let mut upload: Option<SpooledUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(format!("Parse error: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "itemName" => {
                item_name = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(format!("itemName: {}", e)))?;
            }
            "uploadedFile" => {
                upload = Some(spool(&state.config.upload_dir, field).await?);
            }
            _ => {}
        }
    }

    validate_item_name(&item_name)?;
    let upload = upload.ok_or_else(|| AppError::Validation("Missing uploaded file".to_string()))?;
    let file_name = download_file_name(&item_name, &upload.original_name);

    tracing::info!("📤 Upload '{}' as blob '{}' ({})", file_name, item_name, upload.content_type);

    state
        .blobs
        .put_from_local_file(&item_name, upload.file.path(), &upload.content_type, &file_name)
        .await?;

    Ok(Redirect::to(DISPLAY_PATH))
}

/// Deletes one blob.
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Redirect> {
    state.blobs.delete(&id).await?;
    Ok(Redirect::to(DISPLAY_PATH))
}
