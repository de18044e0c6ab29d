use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::Utc;

use crate::db::models::Document;
use crate::error::AppError;

/// Fields a document owner may change after creation.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Repository trait for document operations.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document and return it with its id assigned.
    async fn create(&self, doc: Document) -> Result<Document, AppError>;

    /// Find a document by its id.
    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Document>, AppError>;

    /// List documents, newest first. When `search` is set, only documents
    /// whose title or description contains the term (case-insensitive).
    async fn list(&self, search: Option<&str>) -> Result<Vec<Document>, AppError>;

    /// List one author's documents, newest first.
    async fn list_by_author(&self, author: &str) -> Result<Vec<Document>, AppError>;

    /// Apply a metadata update and return the new document state.
    async fn update(
        &self,
        id: &ObjectId,
        update: DocumentUpdate,
    ) -> Result<Option<Document>, AppError>;

    /// Delete a document. Returns false if it did not exist.
    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError>;

    /// Flip `user_id`'s membership in the like set and return the new state.
    ///
    /// Toggling twice with the same identity restores the original set.
    async fn toggle_like(
        &self,
        id: &ObjectId,
        user_id: &str,
    ) -> Result<Option<Document>, AppError>;
}

/// Escape a user-supplied search term for use inside a `$regex` filter,
/// so it matches as a literal substring.
fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(
            c,
            '\\' | '^' | '$' | '.' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// MongoDB implementation of the DocumentRepository.
pub struct MongoDocumentRepository {
    collection: mongodb::Collection<Document>,
}

impl MongoDocumentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("documents"),
        }
    }
}

#[async_trait]
impl DocumentRepository for MongoDocumentRepository {
    async fn create(&self, mut doc: Document) -> Result<Document, AppError> {
        doc.id = Some(ObjectId::new());

        self.collection
            .insert_one(&doc)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(doc)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "_id": *id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Document>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let filter = match search {
            Some(term) if !term.is_empty() => {
                let pattern = escape_regex(term);
                doc! {
                    "$or": [
                        { "title": { "$regex": &pattern, "$options": "i" } },
                        { "description": { "$regex": &pattern, "$options": "i" } },
                    ]
                }
            }
            _ => doc! {},
        };

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let mut cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut documents = Vec::new();
        use futures::TryStreamExt;
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            documents.push(doc);
        }

        Ok(documents)
    }

    async fn list_by_author(&self, author: &str) -> Result<Vec<Document>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let mut cursor = self
            .collection
            .find(doc! { "author": author })
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut documents = Vec::new();
        use futures::TryStreamExt;
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            documents.push(doc);
        }

        Ok(documents)
    }

    async fn update(
        &self,
        id: &ObjectId,
        update: DocumentUpdate,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReturnDocument;

        let mut set = doc! {
            "updated_at": bson::DateTime::from_chrono(Utc::now()),
        };
        if let Some(title) = update.title {
            set.insert("title", title);
        }
        if let Some(description) = update.description {
            set.insert("description", description);
        }

        self.collection
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": set })
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

    async fn toggle_like(
        &self,
        id: &ObjectId,
        user_id: &str,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::ReturnDocument;

        let Some(current) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        // $addToSet keeps the like set duplicate-free even if two toggles race.
        let update = if current.likes.iter().any(|l| l == user_id) {
            doc! { "$pull": { "likes": user_id } }
        } else {
            doc! { "$addToSet": { "likes": user_id } }
        };

        self.collection
            .find_one_and_update(doc! { "_id": *id }, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
