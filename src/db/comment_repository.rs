use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::db::models::Comment;
use crate::error::AppError;

/// Repository trait for comment operations.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a new comment and return it with its id assigned.
    async fn create(&self, comment: Comment) -> Result<Comment, AppError>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Comment>, AppError>;

    /// Comments on one slide, oldest first (conversation order).
    async fn list_for_slide(&self, slide_id: &ObjectId) -> Result<Vec<Comment>, AppError>;

    /// Comments across one document, newest first.
    async fn list_for_document(&self, document_id: &ObjectId) -> Result<Vec<Comment>, AppError>;

    /// Comments across a set of documents, newest first. Used for the
    /// "comments on my documents" listing.
    async fn list_for_documents(
        &self,
        document_ids: &[ObjectId],
    ) -> Result<Vec<Comment>, AppError>;

    /// Replace the comment text and return the new state.
    async fn update_text(&self, id: &ObjectId, text: String)
        -> Result<Option<Comment>, AppError>;

    /// Delete a comment. Returns false if it did not exist.
    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError>;

    /// Remove all comments of a document (cascade delete).
    async fn delete_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError>;
}

/// MongoDB implementation of the CommentRepository.
pub struct MongoCommentRepository {
    collection: mongodb::Collection<Comment>,
}

impl MongoCommentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("comments"),
        }
    }

    async fn find_sorted(
        &self,
        filter: bson::Document,
        sort: bson::Document,
    ) -> Result<Vec<Comment>, AppError> {
        use mongodb::options::FindOptions;

        let options = FindOptions::builder().sort(sort).build();

        let mut cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut comments = Vec::new();
        use futures::TryStreamExt;
        while let Some(comment) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            comments.push(comment);
        }

        Ok(comments)
    }
}

#[async_trait]
impl CommentRepository for MongoCommentRepository {
    async fn create(&self, mut comment: Comment) -> Result<Comment, AppError> {
        comment.id = Some(ObjectId::new());

        self.collection
            .insert_one(&comment)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(comment)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Comment>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "_id": *id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_for_slide(&self, slide_id: &ObjectId) -> Result<Vec<Comment>, AppError> {
        use mongodb::bson::doc;

        self.find_sorted(doc! { "slide_id": *slide_id }, doc! { "created_at": 1 })
            .await
    }

    async fn list_for_document(&self, document_id: &ObjectId) -> Result<Vec<Comment>, AppError> {
        use mongodb::bson::doc;

        self.find_sorted(
            doc! { "document_id": *document_id },
            doc! { "created_at": -1 },
        )
        .await
    }

    async fn list_for_documents(
        &self,
        document_ids: &[ObjectId],
    ) -> Result<Vec<Comment>, AppError> {
        use mongodb::bson::doc;

        if document_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.find_sorted(
            doc! { "document_id": { "$in": document_ids.to_vec() } },
            doc! { "created_at": -1 },
        )
        .await
    }

    async fn update_text(
        &self,
        id: &ObjectId,
        text: String,
    ) -> Result<Option<Comment>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReturnDocument;

        self.collection
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": { "text": text } })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .delete_one(doc! { "_id": *id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.deleted_count > 0)
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
