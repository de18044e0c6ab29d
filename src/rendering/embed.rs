use serde::Serialize;

use crate::db::models::{BlockKind, ContentBlock};
use crate::rendering::markdown::render_markdown;

/// Normalize a user-pasted YouTube URL into an embeddable form.
///
/// Recognizes the three common shapes (`watch?v=`, `youtu.be/`, `embed/`)
/// and returns `None` for anything else so callers can surface an explicit
/// error state instead of failing silently.
pub fn youtube_embed_url(url: &str) -> Option<String> {
    let video_id = if let Some(rest) = url.split_once("youtube.com/watch?v=").map(|(_, r)| r) {
        rest.split('&').next()
    } else if let Some(rest) = url.split_once("youtu.be/").map(|(_, r)| r) {
        rest.split('?').next()
    } else if let Some(rest) = url.split_once("youtube.com/embed/").map(|(_, r)| r) {
        rest.split('?').next()
    } else {
        None
    };

    match video_id {
        Some(id) if !id.is_empty() => Some(format!("https://www.youtube.com/embed/{id}")),
        _ => None,
    }
}

/// The client-facing rendered form of one content block.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RenderedBlock {
    /// Sanitized HTML from the markdown pipeline (text and markdown blocks).
    Html { html: String },
    /// A stored file referenced by path (image, pdf, video, audio).
    File { url: String, kind: BlockKind },
    /// A normalized YouTube embed URL.
    Embed { url: String },
    /// An unrenderable block, surfaced explicitly rather than dropped.
    Error { message: String },
}

/// Apply the per-kind rendering rule to one block.
pub fn render_block(block: &ContentBlock) -> RenderedBlock {
    match block.kind {
        BlockKind::Text | BlockKind::Markdown => RenderedBlock::Html {
            html: render_markdown(&block.content),
        },
        BlockKind::Image | BlockKind::Pdf | BlockKind::Video | BlockKind::Audio => {
            RenderedBlock::File {
                url: block.content.clone(),
                kind: block.kind,
            }
        }
        BlockKind::Youtube => match youtube_embed_url(&block.content) {
            Some(url) => RenderedBlock::Embed { url },
            None => RenderedBlock::Error {
                message: "Invalid YouTube URL".to_string(),
            },
        },
    }
}
