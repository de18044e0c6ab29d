use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::documents::MessageResponse;
use crate::app::AppState;
use crate::auth::Identity;
use crate::db::models::BlockKind;
use crate::error::AppError;
use crate::storage::client::StorageClient;

/// Upper bound on a single uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpeg", "jpg", "png", "gif", "pdf", "mp4", "webm", "ogg", "mp3", "wav", "m4a", "aac", "md",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub original_name: String,
    pub kind: BlockKind,
    pub is_markdown: bool,
    /// Present only for markdown files, which are returned inline instead
    /// of being stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn kind_for_extension(ext: &str) -> BlockKind {
    match ext {
        "jpeg" | "jpg" | "png" | "gif" => BlockKind::Image,
        "pdf" => BlockKind::Pdf,
        "mp4" | "webm" => BlockKind::Video,
        "ogg" | "mp3" | "wav" | "m4a" | "aac" => BlockKind::Audio,
        _ => BlockKind::Markdown,
    }
}

/// Reject names that could escape the upload directory.
fn sanitize_filename(name: &str) -> Result<&str, AppError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::BadRequest("Invalid filename".into()));
    }
    Ok(name)
}

/// Core upload logic, split from the handler so the multipart plumbing
/// stays at the edge.
pub async fn store_upload(
    storage: &dyn StorageClient,
    original_name: &str,
    bytes: Vec<u8>,
) -> Result<UploadResponse, AppError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::invalid_field("file", "File exceeds 50MB limit"));
    }

    let Some(ext) = extension_of(original_name) else {
        return Err(AppError::invalid_field("file", "Unsupported file type"));
    };
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::invalid_field("file", "Unsupported file type"));
    }

    let kind = kind_for_extension(&ext);

    // Markdown is content, not an asset: hand it back inline and skip the
    // storage write entirely.
    if ext == "md" {
        let content = String::from_utf8(bytes)
            .map_err(|_| AppError::invalid_field("file", "Markdown file is not valid UTF-8"))?;
        return Ok(UploadResponse {
            url: None,
            filename: None,
            original_name: original_name.to_string(),
            kind: BlockKind::Markdown,
            is_markdown: true,
            content: Some(content),
        });
    }

    let stored_name = format!("{}.{}", Uuid::new_v4(), ext);
    storage.put_object(&stored_name, bytes).await?;

    Ok(UploadResponse {
        url: Some(format!("/uploads/{stored_name}")),
        filename: Some(stored_name),
        original_name: original_name.to_string(),
        kind,
        is_markdown: false,
        content: None,
    })
}

/// `POST /upload`: multipart form with a single `file` field.
pub async fn upload_handler(
    State(state): State<AppState>,
    _identity: Identity,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::invalid_field("file", "Missing filename"))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?
            .to_vec();

        let response = store_upload(state.storage.as_ref(), &original_name, bytes).await?;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    Err(AppError::invalid_field("file", "No file was uploaded"))
}

/// `GET /uploads/{filename}`: serve a stored file with a guessed
/// content type.
pub async fn serve_upload_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let filename = sanitize_filename(&filename)?;

    let bytes = state
        .storage
        .get_object(filename)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let mime = mime_guess::from_path(filename).first_or_octet_stream();

    Ok((
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        bytes,
    )
        .into_response())
}

/// `DELETE /upload/{filename}`
pub async fn delete_upload_handler(
    State(state): State<AppState>,
    _identity: Identity,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let filename = sanitize_filename(&filename)?;

    if !state.storage.delete_object(filename).await? {
        return Err(AppError::NotFound("File not found".into()));
    }

    Ok(Json(MessageResponse::new("File deleted successfully")))
}
