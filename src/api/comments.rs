use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::documents::MessageResponse;
use crate::app::AppState;
use crate::auth::Identity;
use crate::db::comment_repository::CommentRepository;
use crate::db::models::{parse_object_id, Comment};
use crate::db::slide_repository::SlideRepository;
use crate::error::{AppError, FieldError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub slide_id: String,
    pub document_id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.map(|id| id.to_hex()).unwrap_or_default(),
            slide_id: comment.slide_id.to_hex(),
            document_id: comment.document_id.to_hex(),
            author: comment.author,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub slide_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub text: String,
}

/// Core comment creation. The parent document id is resolved from the
/// slide rather than trusted from the client, so a comment can never point
/// at a slide/document pair that does not exist.
pub async fn create_comment(
    slides: &dyn SlideRepository,
    comments: &dyn CommentRepository,
    author: &str,
    request: CreateCommentRequest,
) -> Result<Comment, AppError> {
    let mut errors = Vec::new();
    if request.slide_id.is_empty() {
        errors.push(FieldError::new("slideId", "Slide ID is required"));
    }
    if request.text.trim().is_empty() {
        errors.push(FieldError::new("text", "Comment text is required"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let slide_id = parse_object_id(&request.slide_id, "slide")?;
    let slide = slides
        .find_by_id(&slide_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Slide not found".into()))?;

    comments
        .create(Comment {
            id: None,
            slide_id,
            document_id: slide.document_id,
            author: author.to_string(),
            text: request.text.trim().to_string(),
            created_at: Utc::now(),
        })
        .await
}

/// Look up a comment and verify the requester wrote it.
async fn find_own_comment(
    comments: &dyn CommentRepository,
    user_id: &str,
    id: &bson::oid::ObjectId,
) -> Result<Comment, AppError> {
    let comment = comments
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;

    if comment.author != user_id {
        return Err(AppError::Forbidden("Not authorized".into()));
    }

    Ok(comment)
}

/// `POST /comments`
pub async fn create_comment_handler(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = create_comment(
        state.slides.as_ref(),
        state.comments.as_ref(),
        &identity.user_id,
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// `GET /comments/slide/{slideId}`: oldest first.
pub async fn list_slide_comments_handler(
    State(state): State<AppState>,
    Path(slide_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let slide_id = parse_object_id(&slide_id, "slide")?;
    let comments = state.comments.list_for_slide(&slide_id).await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

/// `GET /comments/document/{documentId}`: newest first.
pub async fn list_document_comments_handler(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let document_id = parse_object_id(&document_id, "document")?;
    let comments = state.comments.list_for_document(&document_id).await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

/// `GET /comments/my-documents`: every comment left on the requester's
/// documents, newest first.
pub async fn list_my_document_comments_handler(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let docs = state.documents.list_by_author(&identity.user_id).await?;
    let ids: Vec<bson::oid::ObjectId> = docs.iter().filter_map(|d| d.id).collect();
    let comments = state.comments.list_for_documents(&ids).await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

/// `PUT /comments/{id}` (comment author only)
pub async fn update_comment_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let id = parse_object_id(&id, "comment")?;
    find_own_comment(state.comments.as_ref(), &identity.user_id, &id).await?;

    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::invalid_field("text", "Comment text is required"));
    }

    let comment = state
        .comments
        .update_text(&id, text)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;

    Ok(Json(comment.into()))
}

/// `DELETE /comments/{id}` (comment author only)
pub async fn delete_comment_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_object_id(&id, "comment")?;
    find_own_comment(state.comments.as_ref(), &identity.user_id, &id).await?;

    state.comments.delete(&id).await?;

    Ok(Json(MessageResponse::new("Comment deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use crate::db::mock::{MockCommentRepository, MockSlideRepository};
    use crate::db::models::Slide;

    async fn seeded_slide(slides: &MockSlideRepository) -> Slide {
        slides
            .append(Slide {
                id: None,
                document_id: ObjectId::new(),
                content_blocks: vec![],
                content: Some("Hello".to_string()),
                content_type: None,
                order: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn comment_inherits_document_from_slide() {
        let slides = MockSlideRepository::default();
        let comments = MockCommentRepository::default();
        let slide = seeded_slide(&slides).await;

        let comment = create_comment(
            &slides,
            &comments,
            "alice",
            CreateCommentRequest {
                slide_id: slide.id.unwrap().to_hex(),
                text: "  nice slide  ".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(comment.document_id, slide.document_id);
        assert_eq!(comment.author, "alice");
        assert_eq!(comment.text, "nice slide");
    }

    #[tokio::test]
    async fn missing_fields_are_reported_together() {
        let slides = MockSlideRepository::default();
        let comments = MockCommentRepository::default();

        let err = create_comment(
            &slides,
            &comments,
            "alice",
            CreateCommentRequest {
                slide_id: String::new(),
                text: "   ".to_string(),
            },
        )
        .await
        .unwrap_err();

        match err {
            AppError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["slideId", "text"]);
            }
            other => panic!("Expected Validation, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn comment_on_missing_slide_is_404() {
        let slides = MockSlideRepository::default();
        let comments = MockCommentRepository::default();

        let err = create_comment(
            &slides,
            &comments,
            "alice",
            CreateCommentRequest {
                slide_id: ObjectId::new().to_hex(),
                text: "hi".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_the_author_may_touch_a_comment() {
        let slides = MockSlideRepository::default();
        let comments = MockCommentRepository::default();
        let slide = seeded_slide(&slides).await;

        let comment = create_comment(
            &slides,
            &comments,
            "alice",
            CreateCommentRequest {
                slide_id: slide.id.unwrap().to_hex(),
                text: "mine".to_string(),
            },
        )
        .await
        .unwrap();

        let err = find_own_comment(&comments, "bob", &comment.id.unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let ok = find_own_comment(&comments, "alice", &comment.id.unwrap()).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn slide_comments_are_oldest_first() {
        let slides = MockSlideRepository::default();
        let comments = MockCommentRepository::default();
        let slide = seeded_slide(&slides).await;
        let slide_id = slide.id.unwrap();

        for (i, text) in ["first", "second"].iter().enumerate() {
            comments
                .create(Comment {
                    id: None,
                    slide_id,
                    document_id: slide.document_id,
                    author: "alice".to_string(),
                    text: text.to_string(),
                    created_at: Utc::now() + chrono::Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }

        let listed = comments.list_for_slide(&slide_id).await.unwrap();
        assert_eq!(listed[0].text, "first");
        assert_eq!(listed[1].text, "second");
    }
}
