use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::Identity;
use crate::db::comment_repository::CommentRepository;
use crate::db::document_repository::{DocumentRepository, DocumentUpdate};
use crate::db::models::{parse_object_id, Document};
use crate::db::slide_repository::SlideRepository;
use crate::error::AppError;

use crate::api::slides::SlideResponse;

/// A document as returned by the API (ids as hex strings, camelCase fields).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub likes: Vec<String>,
    pub likes_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            likes_count: doc.likes.len(),
            title: doc.title,
            description: doc.description,
            author: doc.author,
            likes: doc.likes,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Generic "it worked" body for deletes.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWithSlides {
    pub document: DocumentResponse,
    pub slides: Vec<SlideResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub document: DocumentResponse,
    pub likes_count: usize,
    pub is_liked: bool,
}

/// Look up a document and verify the requester owns it.
pub async fn find_owned_document(
    repo: &dyn DocumentRepository,
    id: &bson::oid::ObjectId,
    user_id: &str,
) -> Result<Document, AppError> {
    let doc = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    if doc.author != user_id {
        return Err(AppError::Forbidden("Not authorized".into()));
    }

    Ok(doc)
}

/// Core creation logic, separated from the HTTP layer for testability.
pub async fn create_document(
    repo: &dyn DocumentRepository,
    author: &str,
    request: CreateDocumentRequest,
) -> Result<Document, AppError> {
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::invalid_field("title", "Title is required"));
    }

    let now = Utc::now();
    repo.create(Document {
        id: None,
        title,
        description: request.description,
        author: author.to_string(),
        likes: Vec::new(),
        created_at: now,
        updated_at: now,
    })
    .await
}

/// Core delete logic: cascades to the document's slides and comments.
pub async fn delete_document(
    documents: &dyn DocumentRepository,
    slides: &dyn SlideRepository,
    comments: &dyn CommentRepository,
    user_id: &str,
    id: &bson::oid::ObjectId,
) -> Result<(), AppError> {
    find_owned_document(documents, id, user_id).await?;

    slides.delete_for_document(id).await?;
    comments.delete_for_document(id).await?;
    documents.delete(id).await?;

    Ok(())
}

/// `POST /documents`
pub async fn create_document_handler(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    let doc = create_document(state.documents.as_ref(), &identity.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(doc.into())))
}

/// `GET /documents?search=`
pub async fn list_documents_handler(
    State(state): State<AppState>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let docs = state.documents.list(query.search.as_deref()).await?;
    Ok(Json(docs.into_iter().map(Into::into).collect()))
}

/// `GET /documents/{id}`: the document plus its slides, sorted by order.
pub async fn get_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentWithSlides>, AppError> {
    let id = parse_object_id(&id, "document")?;

    let doc = state
        .documents
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    let slides = state.slides.list_for_document(&id).await?;

    Ok(Json(DocumentWithSlides {
        document: doc.into(),
        slides: slides.into_iter().map(Into::into).collect(),
    }))
}

/// `PUT /documents/{id}` (owner only)
pub async fn update_document_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = parse_object_id(&id, "document")?;
    find_owned_document(state.documents.as_ref(), &id, &identity.user_id).await?;

    // A title, when present, gets the same validation as on create.
    let title = match request.title {
        Some(title) => {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(AppError::invalid_field("title", "Title is required"));
            }
            Some(title)
        }
        None => None,
    };

    let update = DocumentUpdate {
        title,
        description: request.description,
    };

    let doc = state
        .documents
        .update(&id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    Ok(Json(doc.into()))
}

/// `DELETE /documents/{id}` (owner only, cascades)
pub async fn delete_document_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_object_id(&id, "document")?;

    delete_document(
        state.documents.as_ref(),
        state.slides.as_ref(),
        state.comments.as_ref(),
        &identity.user_id,
        &id,
    )
    .await?;

    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

/// `GET /documents/user/{userId}`
pub async fn list_user_documents_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let docs = state.documents.list_by_author(&user_id).await?;
    Ok(Json(docs.into_iter().map(Into::into).collect()))
}

/// `POST /documents/{id}/like`: idempotent per-user toggle.
pub async fn toggle_like_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>, AppError> {
    let id = parse_object_id(&id, "document")?;

    let doc = state
        .documents
        .toggle_like(&id, &identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

    let is_liked = doc.likes.iter().any(|l| l == &identity.user_id);
    let likes_count = doc.likes.len();

    Ok(Json(LikeResponse {
        document: doc.into(),
        likes_count,
        is_liked,
    }))
}
