//! In-memory repository implementations for unit tests.
//!
//! These mirror the semantics of the Mongo implementations, including the
//! dense-order maintenance of the slide repository, so handler logic can be
//! exercised without a database.

use std::sync::Mutex;

use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::db::comment_repository::CommentRepository;
use crate::db::document_repository::{DocumentRepository, DocumentUpdate};
use crate::db::models::{Comment, Document, Slide};
use crate::db::slide_repository::{SlideRepository, SlideUpdate};
use crate::error::AppError;
use crate::storage::client::StorageClient;

#[derive(Default)]
pub struct MockDocumentRepository {
    pub documents: Mutex<Vec<Document>>,
}

#[async_trait]
impl DocumentRepository for MockDocumentRepository {
    async fn create(&self, mut doc: Document) -> Result<Document, AppError> {
        doc.id = Some(ObjectId::new());
        self.documents.lock().unwrap().push(doc.clone());
        Ok(doc)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Document>, AppError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id.as_ref() == Some(id))
            .cloned())
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Document>, AppError> {
        let mut docs: Vec<Document> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| match search {
                Some(term) if !term.is_empty() => {
                    let term = term.to_lowercase();
                    d.title.to_lowercase().contains(&term)
                        || d.description.to_lowercase().contains(&term)
                }
                _ => true,
            })
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn list_by_author(&self, author: &str) -> Result<Vec<Document>, AppError> {
        let mut docs: Vec<Document> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.author == author)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn update(
        &self,
        id: &ObjectId,
        update: DocumentUpdate,
    ) -> Result<Option<Document>, AppError> {
        let mut docs = self.documents.lock().unwrap();
        let Some(doc) = docs.iter_mut().find(|d| d.id.as_ref() == Some(id)) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            doc.title = title;
        }
        if let Some(description) = update.description {
            doc.description = description;
        }
        doc.updated_at = chrono::Utc::now();
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError> {
        let mut docs = self.documents.lock().unwrap();
        let before = docs.len();
        docs.retain(|d| d.id.as_ref() != Some(id));
        Ok(docs.len() < before)
    }

    async fn toggle_like(
        &self,
        id: &ObjectId,
        user_id: &str,
    ) -> Result<Option<Document>, AppError> {
        let mut docs = self.documents.lock().unwrap();
        let Some(doc) = docs.iter_mut().find(|d| d.id.as_ref() == Some(id)) else {
            return Ok(None);
        };
        if let Some(pos) = doc.likes.iter().position(|l| l == user_id) {
            doc.likes.remove(pos);
        } else {
            doc.likes.push(user_id.to_string());
        }
        Ok(Some(doc.clone()))
    }
}

#[derive(Default)]
pub struct MockSlideRepository {
    pub slides: Mutex<Vec<Slide>>,
}

#[async_trait]
impl SlideRepository for MockSlideRepository {
    async fn append(&self, mut slide: Slide) -> Result<Slide, AppError> {
        let mut slides = self.slides.lock().unwrap();
        // Order assigned under the same lock that guards the insert, like
        // the Mongo implementation counts inside its transaction.
        slide.order = slides
            .iter()
            .filter(|s| s.document_id == slide.document_id)
            .count() as i64;
        slide.id = Some(ObjectId::new());
        slides.push(slide.clone());
        Ok(slide)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Slide>, AppError> {
        Ok(self
            .slides
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id.as_ref() == Some(id))
            .cloned())
    }

    async fn list_for_document(&self, document_id: &ObjectId) -> Result<Vec<Slide>, AppError> {
        let mut slides: Vec<Slide> = self
            .slides
            .lock()
            .unwrap()
            .iter()
            .filter(|s| &s.document_id == document_id)
            .cloned()
            .collect();
        slides.sort_by_key(|s| s.order);
        Ok(slides)
    }

    async fn count_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError> {
        Ok(self
            .slides
            .lock()
            .unwrap()
            .iter()
            .filter(|s| &s.document_id == document_id)
            .count() as u64)
    }

    async fn update(
        &self,
        id: &ObjectId,
        update: SlideUpdate,
    ) -> Result<Option<Slide>, AppError> {
        let mut slides = self.slides.lock().unwrap();
        let Some(slide) = slides.iter_mut().find(|s| s.id.as_ref() == Some(id)) else {
            return Ok(None);
        };
        if let Some(blocks) = update.content_blocks {
            slide.content_blocks = blocks;
        }
        if let Some(content) = update.content {
            slide.content = Some(content);
        }
        if let Some(content_type) = update.content_type {
            slide.content_type = Some(content_type);
        }
        Ok(Some(slide.clone()))
    }

    async fn delete_and_close_gap(&self, slide: &Slide) -> Result<(), AppError> {
        let mut slides = self.slides.lock().unwrap();
        slides.retain(|s| s.id != slide.id);
        for s in slides.iter_mut() {
            if s.document_id == slide.document_id && s.order > slide.order {
                s.order -= 1;
            }
        }
        Ok(())
    }

    async fn insert_after(&self, after_order: i64, mut slide: Slide) -> Result<Slide, AppError> {
        let mut slides = self.slides.lock().unwrap();
        let count = slides
            .iter()
            .filter(|s| s.document_id == slide.document_id)
            .count() as i64;
        if after_order < -1 || after_order >= count {
            return Err(AppError::invalid_field(
                "afterOrder",
                "afterOrder must be -1 or the order of an existing slide",
            ));
        }
        for s in slides.iter_mut() {
            if s.document_id == slide.document_id && s.order > after_order {
                s.order += 1;
            }
        }
        slide.id = Some(ObjectId::new());
        slide.order = after_order + 1;
        slides.push(slide.clone());
        Ok(slide)
    }

    async fn apply_order(
        &self,
        document_id: &ObjectId,
        assignments: &[(ObjectId, i64)],
    ) -> Result<(), AppError> {
        let mut slides = self.slides.lock().unwrap();
        for (slide_id, new_order) in assignments {
            if let Some(slide) = slides
                .iter_mut()
                .find(|s| s.id.as_ref() == Some(slide_id) && &s.document_id == document_id)
            {
                slide.order = *new_order;
            }
        }
        Ok(())
    }

    async fn delete_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError> {
        let mut slides = self.slides.lock().unwrap();
        let before = slides.len();
        slides.retain(|s| &s.document_id != document_id);
        Ok((before - slides.len()) as u64)
    }
}

#[derive(Default)]
pub struct MockCommentRepository {
    pub comments: Mutex<Vec<Comment>>,
}

#[async_trait]
impl CommentRepository for MockCommentRepository {
    async fn create(&self, mut comment: Comment) -> Result<Comment, AppError> {
        comment.id = Some(ObjectId::new());
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Comment>, AppError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id.as_ref() == Some(id))
            .cloned())
    }

    async fn list_for_slide(&self, slide_id: &ObjectId) -> Result<Vec<Comment>, AppError> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.slide_id == slide_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn list_for_document(&self, document_id: &ObjectId) -> Result<Vec<Comment>, AppError> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.document_id == document_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn list_for_documents(
        &self,
        document_ids: &[ObjectId],
    ) -> Result<Vec<Comment>, AppError> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| document_ids.contains(&c.document_id))
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn update_text(
        &self,
        id: &ObjectId,
        text: String,
    ) -> Result<Option<Comment>, AppError> {
        let mut comments = self.comments.lock().unwrap();
        let Some(comment) = comments.iter_mut().find(|c| c.id.as_ref() == Some(id)) else {
            return Ok(None);
        };
        comment.text = text;
        Ok(Some(comment.clone()))
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| c.id.as_ref() != Some(id));
        Ok(comments.len() < before)
    }

    async fn delete_for_document(&self, document_id: &ObjectId) -> Result<u64, AppError> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| &c.document_id != document_id);
        Ok((before - comments.len()) as u64)
    }
}

#[derive(Default)]
pub struct MockStorage {
    pub objects: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StorageClient for MockStorage {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn delete_object(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.objects.lock().unwrap().remove(key).is_some())
    }
}
