use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// The content kinds a slide block can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
    Pdf,
    Video,
    Audio,
    Youtube,
    Markdown,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Pdf => "pdf",
            BlockKind::Video => "video",
            BlockKind::Audio => "audio",
            BlockKind::Youtube => "youtube",
            BlockKind::Markdown => "markdown",
        };
        write!(f, "{s}")
    }
}

/// One typed content unit inside a slide.
///
/// `order` is local to the parent slide and is normalized on write
/// (sorted, then reindexed from 0) so the sub-ordering stays dense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Raw text, a stored-file path, or a youtube URL depending on `kind`.
    pub content: String,
    pub order: i64,
}

/// A shareable unit containing an ordered list of slides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// The authenticated identity that owns this document.
    pub author: String,
    /// Like set: each identity appears at most once.
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// One ordered position within a document.
///
/// Invariant: for a given document the `order` values are exactly `0..n-1`.
/// All order mutations go through [`crate::db::slide_repository::SlideRepository`],
/// which renumbers transactionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub document_id: ObjectId,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
    /// Legacy single-content field, superseded by `content_blocks`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<BlockKind>,
    pub order: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A reader comment attached to one slide.
///
/// `document_id` is denormalized from the slide so document-level
/// listings don't need a join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub slide_id: ObjectId,
    pub document_id: ObjectId,
    pub author: String,
    pub text: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Parse a path/body id into an ObjectId, mapping failure to a 400.
pub fn parse_object_id(value: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(value).map_err(|_| AppError::BadRequest(format!("Invalid {what} id")))
}

/// Sort blocks by their client-supplied order, then reindex from 0.
pub fn normalize_blocks(mut blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
    blocks.sort_by_key(|b| b.order);
    for (i, block) in blocks.iter_mut().enumerate() {
        block.order = i as i64;
    }
    blocks
}
