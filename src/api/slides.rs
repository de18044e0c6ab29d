use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::documents::{find_owned_document, MessageResponse};
use crate::app::AppState;
use crate::auth::Identity;
use crate::db::document_repository::DocumentRepository;
use crate::db::models::{normalize_blocks, parse_object_id, BlockKind, ContentBlock, Slide};
use crate::db::slide_repository::{SlideRepository, SlideUpdate};
use crate::error::AppError;
use crate::rendering::embed::{render_block, RenderedBlock};

/// A slide as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideResponse {
    pub id: String,
    pub document_id: String,
    pub content_blocks: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<BlockKind>,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Slide> for SlideResponse {
    fn from(slide: Slide) -> Self {
        Self {
            id: slide.id.map(|id| id.to_hex()).unwrap_or_default(),
            document_id: slide.document_id.to_hex(),
            content_blocks: slide.content_blocks,
            content: slide.content,
            content_type: slide.content_type,
            order: slide.order,
            created_at: slide.created_at,
        }
    }
}

/// `POST /slides`: append. The server assigns the order; clients cannot
/// pick an arbitrary position here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlideRequest {
    #[serde(default)]
    pub document_id: String,
    pub content: Option<String>,
    pub content_type: Option<BlockKind>,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertSlideRequest {
    #[serde(default)]
    pub document_id: String,
    pub after_order: Option<i64>,
    pub content: Option<String>,
    pub content_type: Option<BlockKind>,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSlideRequest {
    pub content: Option<String>,
    pub content_type: Option<BlockKind>,
    pub content_blocks: Option<Vec<ContentBlock>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderEntry {
    pub slide_id: String,
    pub new_order: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub slides: Vec<ReorderEntry>,
}

/// The slide's content, shaped for the frontend to render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSlideResponse {
    pub id: String,
    pub document_id: String,
    pub order: i64,
    pub blocks: Vec<RenderedBlock>,
}

/// Build the stored block list from either the block array or the legacy
/// single-content fields. Legacy input is mirrored into both forms, as the
/// data model keeps the superseded fields populated.
fn build_content(
    content: Option<String>,
    content_type: Option<BlockKind>,
    content_blocks: Vec<ContentBlock>,
) -> (Vec<ContentBlock>, Option<String>, Option<BlockKind>) {
    if !content_blocks.is_empty() {
        return (normalize_blocks(content_blocks), None, None);
    }

    match content {
        Some(content) => {
            let kind = content_type.unwrap_or(BlockKind::Text);
            let blocks = vec![ContentBlock {
                kind,
                content: content.clone(),
                order: 0,
            }];
            (blocks, Some(content), Some(kind))
        }
        None => (Vec::new(), None, None),
    }
}

/// Core append logic. The repository assigns the new slide's order from
/// the slide count it observes atomically with the insert, so appends stay
/// dense even when requests race.
pub async fn append_slide(
    documents: &dyn DocumentRepository,
    slides: &dyn SlideRepository,
    user_id: &str,
    request: CreateSlideRequest,
) -> Result<Slide, AppError> {
    if request.document_id.is_empty() {
        return Err(AppError::invalid_field(
            "documentId",
            "Document ID is required",
        ));
    }
    let document_id = parse_object_id(&request.document_id, "document")?;
    find_owned_document(documents, &document_id, user_id).await?;

    let (content_blocks, content, content_type) =
        build_content(request.content, request.content_type, request.content_blocks);

    slides
        .append(Slide {
            id: None,
            document_id,
            content_blocks,
            content,
            content_type,
            order: 0, // assigned by the repository
            created_at: Utc::now(),
        })
        .await
}

/// Core insert logic: shift everything past the insertion point up by one,
/// atomically, and place the new slide at `afterOrder + 1`.
///
/// `afterOrder` must be `-1` (insert at the front) or the order of an
/// existing slide; anything else is rejected instead of leaving a gap. The
/// range check runs inside the repository against the count it inserts
/// with, not against an earlier read.
pub async fn insert_slide(
    documents: &dyn DocumentRepository,
    slides: &dyn SlideRepository,
    user_id: &str,
    request: InsertSlideRequest,
) -> Result<Slide, AppError> {
    if request.document_id.is_empty() {
        return Err(AppError::invalid_field(
            "documentId",
            "Document ID is required",
        ));
    }
    let Some(after_order) = request.after_order else {
        return Err(AppError::invalid_field(
            "afterOrder",
            "afterOrder must be a number",
        ));
    };

    let document_id = parse_object_id(&request.document_id, "document")?;
    find_owned_document(documents, &document_id, user_id).await?;

    let (content_blocks, content, content_type) =
        build_content(request.content, request.content_type, request.content_blocks);

    slides
        .insert_after(
            after_order,
            Slide {
                id: None,
                document_id,
                content_blocks,
                content,
                content_type,
                order: 0, // overwritten by the repository
                created_at: Utc::now(),
            },
        )
        .await
}

/// Core reorder logic: the request must assign every slide of the document
/// exactly one new order, and the new orders must be a permutation of
/// 0..n-1. Anything else is rejected with nothing applied.
pub async fn reorder_slides(
    documents: &dyn DocumentRepository,
    slides: &dyn SlideRepository,
    user_id: &str,
    document_id: &ObjectId,
    request: ReorderRequest,
) -> Result<(), AppError> {
    find_owned_document(documents, document_id, user_id).await?;

    let existing = slides.list_for_document(document_id).await?;

    let mut assignments = Vec::with_capacity(request.slides.len());
    for entry in &request.slides {
        let slide_id = parse_object_id(&entry.slide_id, "slide")?;
        assignments.push((slide_id, entry.new_order));
    }

    let mut assigned_ids: Vec<ObjectId> = assignments.iter().map(|(id, _)| *id).collect();
    assigned_ids.sort();
    assigned_ids.dedup();
    if assigned_ids.len() != assignments.len() {
        return Err(AppError::invalid_field(
            "slides",
            "Each slide may appear only once",
        ));
    }

    let mut existing_ids: Vec<ObjectId> = existing.iter().filter_map(|s| s.id).collect();
    existing_ids.sort();
    if assigned_ids != existing_ids {
        return Err(AppError::invalid_field(
            "slides",
            "Reorder must name every slide of the document exactly once",
        ));
    }

    let mut orders: Vec<i64> = assignments.iter().map(|(_, order)| *order).collect();
    orders.sort_unstable();
    if orders.iter().enumerate().any(|(i, order)| *order != i as i64) {
        return Err(AppError::invalid_field(
            "slides",
            "New orders must be a permutation of 0..n-1",
        ));
    }

    slides.apply_order(document_id, &assignments).await
}

/// Look up a slide and verify the requester owns its document.
async fn find_owned_slide(
    documents: &dyn DocumentRepository,
    slides: &dyn SlideRepository,
    user_id: &str,
    id: &ObjectId,
) -> Result<Slide, AppError> {
    let slide = slides
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Slide not found".into()))?;

    find_owned_document(documents, &slide.document_id, user_id).await?;

    Ok(slide)
}

/// `POST /slides`
pub async fn create_slide_handler(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreateSlideRequest>,
) -> Result<(StatusCode, Json<SlideResponse>), AppError> {
    let slide = append_slide(
        state.documents.as_ref(),
        state.slides.as_ref(),
        &identity.user_id,
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(slide.into())))
}

/// `GET /slides/document/{documentId}`
pub async fn list_slides_handler(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<Vec<SlideResponse>>, AppError> {
    let document_id = parse_object_id(&document_id, "document")?;
    let slides = state.slides.list_for_document(&document_id).await?;
    Ok(Json(slides.into_iter().map(Into::into).collect()))
}

/// `PUT /slides/{id}` (document owner only)
pub async fn update_slide_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(request): Json<UpdateSlideRequest>,
) -> Result<Json<SlideResponse>, AppError> {
    let id = parse_object_id(&id, "slide")?;
    find_owned_slide(
        state.documents.as_ref(),
        state.slides.as_ref(),
        &identity.user_id,
        &id,
    )
    .await?;

    let update = SlideUpdate {
        content_blocks: request.content_blocks.map(normalize_blocks),
        content: request.content,
        content_type: request.content_type,
    };

    let slide = state
        .slides
        .update(&id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Slide not found".into()))?;

    Ok(Json(slide.into()))
}

/// `DELETE /slides/{id}` (document owner only; later slides close the gap)
pub async fn delete_slide_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_object_id(&id, "slide")?;
    let slide = find_owned_slide(
        state.documents.as_ref(),
        state.slides.as_ref(),
        &identity.user_id,
        &id,
    )
    .await?;

    state.slides.delete_and_close_gap(&slide).await?;

    Ok(Json(MessageResponse::new("Slide deleted successfully")))
}

/// `POST /slides/insert`
pub async fn insert_slide_handler(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<InsertSlideRequest>,
) -> Result<(StatusCode, Json<SlideResponse>), AppError> {
    let slide = insert_slide(
        state.documents.as_ref(),
        state.slides.as_ref(),
        &identity.user_id,
        request,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(slide.into())))
}

/// `PUT /slides/reorder/{documentId}`
pub async fn reorder_slides_handler(
    State(state): State<AppState>,
    identity: Identity,
    Path(document_id): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let document_id = parse_object_id(&document_id, "document")?;

    reorder_slides(
        state.documents.as_ref(),
        state.slides.as_ref(),
        &identity.user_id,
        &document_id,
        request,
    )
    .await?;

    Ok(Json(MessageResponse::new("Slides reordered successfully")))
}

/// `GET /slides/{id}/rendered`: the per-kind rendering contract, applied
/// server-side. Falls back to the legacy single-content field for slides
/// that predate content blocks.
pub async fn rendered_slide_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RenderedSlideResponse>, AppError> {
    let id = parse_object_id(&id, "slide")?;

    let slide = state
        .slides
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Slide not found".into()))?;

    let blocks: Vec<RenderedBlock> = if !slide.content_blocks.is_empty() {
        slide.content_blocks.iter().map(render_block).collect()
    } else if let Some(content) = &slide.content {
        let block = ContentBlock {
            kind: slide.content_type.unwrap_or(BlockKind::Text),
            content: content.clone(),
            order: 0,
        };
        vec![render_block(&block)]
    } else {
        Vec::new()
    };

    Ok(Json(RenderedSlideResponse {
        id: id.to_hex(),
        document_id: slide.document_id.to_hex(),
        order: slide.order,
        blocks,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::documents::{create_document, CreateDocumentRequest};
    use crate::db::mock::{MockDocumentRepository, MockSlideRepository};
    use crate::db::models::Document;

    async fn owned_document(repo: &MockDocumentRepository, author: &str) -> Document {
        create_document(
            repo,
            author,
            CreateDocumentRequest {
                title: "Deck".to_string(),
                description: String::new(),
            },
        )
        .await
        .unwrap()
    }

    fn text_request(document_id: &ObjectId, content: &str) -> CreateSlideRequest {
        CreateSlideRequest {
            document_id: document_id.to_hex(),
            content: Some(content.to_string()),
            content_type: None,
            content_blocks: vec![],
        }
    }

    async fn orders(slides: &MockSlideRepository, document_id: &ObjectId) -> Vec<(String, i64)> {
        slides
            .list_for_document(document_id)
            .await
            .unwrap()
            .iter()
            .map(|s| (s.content.clone().unwrap_or_default(), s.order))
            .collect()
    }

    #[tokio::test]
    async fn sequential_appends_are_dense() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        for content in ["Hello", "World", "End"] {
            append_slide(&documents, &slides, "owner", text_request(&doc_id, content))
                .await
                .unwrap();
        }

        assert_eq!(
            orders(&slides, &doc_id).await,
            vec![
                ("Hello".to_string(), 0),
                ("World".to_string(), 1),
                ("End".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn racing_appends_get_distinct_orders() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        // Two appends in flight at once must not both claim the same
        // position; the repository assigns orders, not the caller.
        let (left, right) = tokio::join!(
            append_slide(&documents, &slides, "owner", text_request(&doc_id, "left")),
            append_slide(&documents, &slides, "owner", text_request(&doc_id, "right")),
        );

        let mut assigned = vec![left.unwrap().order, right.unwrap().order];
        assigned.sort_unstable();
        assert_eq!(assigned, vec![0, 1]);
    }

    #[tokio::test]
    async fn legacy_content_is_mirrored_into_blocks() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        let slide = append_slide(&documents, &slides, "owner", text_request(&doc_id, "Hi"))
            .await
            .unwrap();

        assert_eq!(slide.content.as_deref(), Some("Hi"));
        assert_eq!(slide.content_type, Some(BlockKind::Text));
        assert_eq!(slide.content_blocks.len(), 1);
        assert_eq!(slide.content_blocks[0].kind, BlockKind::Text);
        assert_eq!(slide.content_blocks[0].content, "Hi");
    }

    #[tokio::test]
    async fn block_orders_are_normalized_on_create() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        let request = CreateSlideRequest {
            document_id: doc_id.to_hex(),
            content: None,
            content_type: None,
            content_blocks: vec![
                ContentBlock {
                    kind: BlockKind::Image,
                    content: "/uploads/b.png".to_string(),
                    order: 9,
                },
                ContentBlock {
                    kind: BlockKind::Text,
                    content: "caption".to_string(),
                    order: 3,
                },
            ],
        };

        let slide = append_slide(&documents, &slides, "owner", request).await.unwrap();
        assert_eq!(slide.content_blocks[0].content, "caption");
        assert_eq!(slide.content_blocks[0].order, 0);
        assert_eq!(slide.content_blocks[1].content, "/uploads/b.png");
        assert_eq!(slide.content_blocks[1].order, 1);
    }

    #[tokio::test]
    async fn append_requires_document_ownership() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        let result =
            append_slide(&documents, &slides, "intruder", text_request(&doc_id, "Hi")).await;
        assert!(matches!(result.unwrap_err(), AppError::Forbidden(_)));
        assert_eq!(slides.count_for_document(&doc_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_after_shifts_later_slides() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        for content in ["Hello", "World"] {
            append_slide(&documents, &slides, "owner", text_request(&doc_id, content))
                .await
                .unwrap();
        }

        let inserted = insert_slide(
            &documents,
            &slides,
            "owner",
            InsertSlideRequest {
                document_id: doc_id.to_hex(),
                after_order: Some(0),
                content: Some("Mid".to_string()),
                content_type: None,
                content_blocks: vec![],
            },
        )
        .await
        .unwrap();

        assert_eq!(inserted.order, 1);
        assert_eq!(
            orders(&slides, &doc_id).await,
            vec![
                ("Hello".to_string(), 0),
                ("Mid".to_string(), 1),
                ("World".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn insert_at_front_with_minus_one() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        append_slide(&documents, &slides, "owner", text_request(&doc_id, "Old first"))
            .await
            .unwrap();

        let inserted = insert_slide(
            &documents,
            &slides,
            "owner",
            InsertSlideRequest {
                document_id: doc_id.to_hex(),
                after_order: Some(-1),
                content: Some("New first".to_string()),
                content_type: None,
                content_blocks: vec![],
            },
        )
        .await
        .unwrap();

        assert_eq!(inserted.order, 0);
        assert_eq!(
            orders(&slides, &doc_id).await,
            vec![("New first".to_string(), 0), ("Old first".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn insert_with_out_of_range_after_order_is_rejected() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        append_slide(&documents, &slides, "owner", text_request(&doc_id, "Only"))
            .await
            .unwrap();

        for bad in [-2, 1, 99] {
            let result = insert_slide(
                &documents,
                &slides,
                "owner",
                InsertSlideRequest {
                    document_id: doc_id.to_hex(),
                    after_order: Some(bad),
                    content: Some("Nope".to_string()),
                    content_type: None,
                    content_blocks: vec![],
                },
            )
            .await;
            assert!(
                matches!(result.unwrap_err(), AppError::Validation(_)),
                "afterOrder {bad} should be rejected"
            );
        }

        // Nothing was inserted or shifted.
        assert_eq!(orders(&slides, &doc_id).await, vec![("Only".to_string(), 0)]);
    }

    #[tokio::test]
    async fn reorder_applies_a_full_permutation() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        let mut ids = Vec::new();
        for content in ["a", "b", "c"] {
            let slide =
                append_slide(&documents, &slides, "owner", text_request(&doc_id, content))
                    .await
                    .unwrap();
            ids.push(slide.id.unwrap());
        }

        // Reverse the deck.
        let request = ReorderRequest {
            slides: vec![
                ReorderEntry {
                    slide_id: ids[0].to_hex(),
                    new_order: 2,
                },
                ReorderEntry {
                    slide_id: ids[1].to_hex(),
                    new_order: 1,
                },
                ReorderEntry {
                    slide_id: ids[2].to_hex(),
                    new_order: 0,
                },
            ],
        };

        reorder_slides(&documents, &slides, "owner", &doc_id, request)
            .await
            .unwrap();

        assert_eq!(
            orders(&slides, &doc_id).await,
            vec![
                ("c".to_string(), 0),
                ("b".to_string(), 1),
                ("a".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn malformed_reorders_are_rejected_without_change() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        let mut ids = Vec::new();
        for content in ["a", "b"] {
            let slide =
                append_slide(&documents, &slides, "owner", text_request(&doc_id, content))
                    .await
                    .unwrap();
            ids.push(slide.id.unwrap());
        }

        // Missing a slide.
        let partial = ReorderRequest {
            slides: vec![ReorderEntry {
                slide_id: ids[0].to_hex(),
                new_order: 0,
            }],
        };
        // Duplicate orders.
        let duplicate = ReorderRequest {
            slides: vec![
                ReorderEntry {
                    slide_id: ids[0].to_hex(),
                    new_order: 0,
                },
                ReorderEntry {
                    slide_id: ids[1].to_hex(),
                    new_order: 0,
                },
            ],
        };
        // Orders out of range.
        let gapped = ReorderRequest {
            slides: vec![
                ReorderEntry {
                    slide_id: ids[0].to_hex(),
                    new_order: 0,
                },
                ReorderEntry {
                    slide_id: ids[1].to_hex(),
                    new_order: 5,
                },
            ],
        };

        for request in [partial, duplicate, gapped] {
            let result = reorder_slides(&documents, &slides, "owner", &doc_id, request).await;
            assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
        }

        assert_eq!(
            orders(&slides, &doc_id).await,
            vec![("a".to_string(), 0), ("b".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn delete_closes_the_gap() {
        let documents = MockDocumentRepository::default();
        let slides = MockSlideRepository::default();
        let doc_id = owned_document(&documents, "owner").await.id.unwrap();

        let mut created = Vec::new();
        for content in ["a", "b", "c"] {
            created.push(
                append_slide(&documents, &slides, "owner", text_request(&doc_id, content))
                    .await
                    .unwrap(),
            );
        }

        slides.delete_and_close_gap(&created[1]).await.unwrap();

        assert_eq!(
            orders(&slides, &doc_id).await,
            vec![("a".to_string(), 0), ("c".to_string(), 1)]
        );
    }
}
