use async_trait::async_trait;
use bson::oid::ObjectId;
use futures::FutureExt;

use crate::db::models::{BlockKind, ContentBlock, Slide};
use crate::error::AppError;

/// Fields a slide owner may change through `PUT /slides/{id}`.
///
/// `order` is deliberately absent: position changes go through
/// [`SlideRepository::insert_after`] and [`SlideRepository::apply_order`]
/// so the dense-order invariant stays enforceable in one place.
#[derive(Debug, Clone, Default)]
pub struct SlideUpdate {
    pub content_blocks: Option<Vec<ContentBlock>>,
    pub content: Option<String>,
    pub content_type: Option<BlockKind>,
}

/// Repository trait for slide operations.
///
/// Implementations must keep the per-document invariant that slide `order`
/// values are exactly `0..n-1`: appending assigns the next order, insertion
/// shifts, deletion closes the gap, and reordering applies a full
/// permutation. Multi-row renumbering is atomic, and concurrent ordering
/// writes against the same document are serialized, so two racing requests
/// cannot read the same count and assign duplicate orders.
#[async_trait]
pub trait SlideRepository: Send + Sync {
    /// Insert a slide at the end of its document. The caller's `order` is
    /// ignored; the repository assigns the current slide count.
    async fn append(&self, slide: Slide) -> Result<Slide, AppError>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Slide>, AppError>;

    /// All slides of a document, sorted ascending by `order`.
    async fn list_for_document(&self, document_id: &ObjectId) -> Result<Vec<Slide>, AppError>;

    async fn count_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError>;

    /// Apply a content update and return the new slide state.
    async fn update(&self, id: &ObjectId, update: SlideUpdate)
        -> Result<Option<Slide>, AppError>;

    /// Delete a slide and decrement the order of every later slide in the
    /// same document, restoring a dense `0..n-1` sequence.
    async fn delete_and_close_gap(&self, slide: &Slide) -> Result<(), AppError>;

    /// Shift every slide of the document with `order > after_order` up by one
    /// and insert the new slide at `after_order + 1`, atomically.
    ///
    /// `after_order` is checked against the slide count as seen by the same
    /// atomic operation; out of range is a field-level validation error.
    async fn insert_after(&self, after_order: i64, slide: Slide) -> Result<Slide, AppError>;

    /// Overwrite the order of each named slide, atomically. The caller is
    /// responsible for validating that the assignment is a permutation.
    async fn apply_order(
        &self,
        document_id: &ObjectId,
        assignments: &[(ObjectId, i64)],
    ) -> Result<(), AppError>;

    /// Remove all slides of a document (cascade delete).
    async fn delete_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError>;
}

/// MongoDB implementation of the SlideRepository.
///
/// Ordering writes run inside transactions (requires MongoDB deployed as a
/// replica set). Every ordering transaction first bumps a revision counter
/// on the parent document, so two transactions renumbering the same
/// document conflict on that row: the server aborts one with a transient
/// error and `and_run` retries it against the committed state. That is what
/// makes count-then-write safe under concurrent requests.
pub struct MongoSlideRepository {
    client: mongodb::Client,
    collection: mongodb::Collection<Slide>,
    documents: mongodb::Collection<bson::Document>,
}

impl MongoSlideRepository {
    pub fn new(client: &mongodb::Client, db: &mongodb::Database) -> Self {
        Self {
            client: client.clone(),
            collection: db.collection("slides"),
            documents: db.collection("documents"),
        }
    }

    async fn session(&self) -> Result<mongodb::ClientSession, AppError> {
        self.client
            .start_session()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Touch the parent document inside the session so concurrent ordering
    /// transactions write-conflict on it.
    async fn lock_document(
        documents: &mongodb::Collection<bson::Document>,
        session: &mut mongodb::ClientSession,
        document_id: ObjectId,
    ) -> mongodb::error::Result<()> {
        use mongodb::bson::doc;

        documents
            .update_one(
                doc! { "_id": document_id },
                doc! { "$inc": { "slide_rev": 1 } },
            )
            .session(session)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SlideRepository for MongoSlideRepository {
    async fn append(&self, mut slide: Slide) -> Result<Slide, AppError> {
        use mongodb::bson::doc;

        slide.id = Some(ObjectId::new());

        let mut session = self.session().await?;
        session
            .start_transaction()
            .and_run(
                (slide, self.collection.clone(), self.documents.clone()),
                |session, ctx| {
                    async move {
                        let (slide, collection, documents) = ctx;
                        Self::lock_document(documents, session, slide.document_id).await?;
                        let count = collection
                            .count_documents(doc! { "document_id": slide.document_id })
                            .session(&mut *session)
                            .await?;
                        slide.order = count as i64;
                        collection
                            .insert_one(&*slide)
                            .session(&mut *session)
                            .await?;
                        Ok(slide.clone())
                    }
                    .boxed()
                },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Slide>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "_id": *id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_for_document(&self, document_id: &ObjectId) -> Result<Vec<Slide>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder().sort(doc! { "order": 1 }).build();

        let mut cursor = self
            .collection
            .find(doc! { "document_id": *document_id })
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut slides = Vec::new();
        use futures::TryStreamExt;
        while let Some(slide) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            slides.push(slide);
        }

        Ok(slides)
    }

    async fn count_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        self.collection
            .count_documents(doc! { "document_id": *document_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update(
        &self,
        id: &ObjectId,
        update: SlideUpdate,
    ) -> Result<Option<Slide>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReturnDocument;

        let mut set = doc! {};
        if let Some(blocks) = update.content_blocks {
            set.insert(
                "content_blocks",
                bson::to_bson(&blocks).map_err(|e| AppError::Database(e.to_string()))?,
            );
        }
        if let Some(content) = update.content {
            set.insert("content", content);
        }
        if let Some(content_type) = update.content_type {
            set.insert(
                "content_type",
                bson::to_bson(&content_type).map_err(|e| AppError::Database(e.to_string()))?,
            );
        }

        if set.is_empty() {
            return self.find_by_id(id).await;
        }

        self.collection
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_and_close_gap(&self, slide: &Slide) -> Result<(), AppError> {
        use mongodb::bson::doc;

        let id = slide
            .id
            .ok_or_else(|| AppError::Database("slide has no id".into()))?;
        let document_id = slide.document_id;
        let order = slide.order;

        let mut session = self.session().await?;
        session
            .start_transaction()
            .and_run(
                (self.collection.clone(), self.documents.clone()),
                |session, ctx| {
                    async move {
                        let (collection, documents) = ctx;
                        Self::lock_document(documents, session, document_id).await?;
                        collection
                            .delete_one(doc! { "_id": id })
                            .session(&mut *session)
                            .await?;
                        collection
                            .update_many(
                                doc! { "document_id": document_id, "order": { "$gt": order } },
                                doc! { "$inc": { "order": -1 } },
                            )
                            .session(&mut *session)
                            .await?;
                        Ok(())
                    }
                    .boxed()
                },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn insert_after(&self, after_order: i64, mut slide: Slide) -> Result<Slide, AppError> {
        use mongodb::bson::doc;

        slide.id = Some(ObjectId::new());

        let inserted = {
            let mut session = self.session().await?;
            session
                .start_transaction()
                .and_run(
                    (slide, self.collection.clone(), self.documents.clone()),
                    |session, ctx| {
                        async move {
                            let (slide, collection, documents) = ctx;
                            Self::lock_document(documents, session, slide.document_id).await?;
                            let count = collection
                                .count_documents(doc! { "document_id": slide.document_id })
                                .session(&mut *session)
                                .await? as i64;
                            if after_order < -1 || after_order >= count {
                                return Ok(None);
                            }
                            collection
                                .update_many(
                                    doc! {
                                        "document_id": slide.document_id,
                                        "order": { "$gt": after_order },
                                    },
                                    doc! { "$inc": { "order": 1 } },
                                )
                                .session(&mut *session)
                                .await?;
                            slide.order = after_order + 1;
                            collection
                                .insert_one(&*slide)
                                .session(&mut *session)
                                .await?;
                            Ok(Some(slide.clone()))
                        }
                        .boxed()
                    },
                )
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
        };

        inserted.ok_or_else(|| {
            AppError::invalid_field(
                "afterOrder",
                "afterOrder must be -1 or the order of an existing slide",
            )
        })
    }

    async fn apply_order(
        &self,
        document_id: &ObjectId,
        assignments: &[(ObjectId, i64)],
    ) -> Result<(), AppError> {
        use mongodb::bson::doc;

        let document_id = *document_id;

        let mut session = self.session().await?;
        session
            .start_transaction()
            .and_run(
                (
                    assignments.to_vec(),
                    self.collection.clone(),
                    self.documents.clone(),
                ),
                |session, ctx| {
                    async move {
                        let (assignments, collection, documents) = ctx;
                        Self::lock_document(documents, session, document_id).await?;
                        for (slide_id, new_order) in assignments.iter() {
                            collection
                                .update_one(
                                    doc! { "_id": *slide_id, "document_id": document_id },
                                    doc! { "$set": { "order": *new_order } },
                                )
                                .session(&mut *session)
                                .await?;
                        }
                        Ok(())
                    }
                    .boxed()
                },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .delete_many(doc! { "document_id": *document_id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.deleted_count)
    }
}
