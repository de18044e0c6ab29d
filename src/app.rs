use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::AuthKeys;
use crate::db::comment_repository::CommentRepository;
use crate::db::document_repository::DocumentRepository;
use crate::db::slide_repository::SlideRepository;
use crate::storage::client::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentRepository>,
    pub slides: Arc<dyn SlideRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub auth: AuthKeys,
}

impl FromRef<AppState> for AuthKeys {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub upload_dir: String,
    pub auth_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            mongodb_uri: std::env::var("MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongodb_database: std::env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| "deckshare".to_string()),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            auth_secret: std::env::var("AUTH_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
        }
    }
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Documents
        .route(
            "/documents",
            post(api::documents::create_document_handler).get(api::documents::list_documents_handler),
        )
        .route(
            "/documents/{id}",
            get(api::documents::get_document_handler)
                .put(api::documents::update_document_handler)
                .delete(api::documents::delete_document_handler),
        )
        .route(
            "/documents/user/{userId}",
            get(api::documents::list_user_documents_handler),
        )
        .route(
            "/documents/{id}/like",
            post(api::documents::toggle_like_handler),
        )
        // Slides
        .route("/slides", post(api::slides::create_slide_handler))
        .route("/slides/insert", post(api::slides::insert_slide_handler))
        .route(
            "/slides/document/{documentId}",
            get(api::slides::list_slides_handler),
        )
        .route(
            "/slides/reorder/{documentId}",
            put(api::slides::reorder_slides_handler),
        )
        .route(
            "/slides/{id}",
            put(api::slides::update_slide_handler).delete(api::slides::delete_slide_handler),
        )
        .route(
            "/slides/{id}/rendered",
            get(api::slides::rendered_slide_handler),
        )
        // Comments
        .route("/comments", post(api::comments::create_comment_handler))
        .route(
            "/comments/slide/{slideId}",
            get(api::comments::list_slide_comments_handler),
        )
        .route(
            "/comments/document/{documentId}",
            get(api::comments::list_document_comments_handler),
        )
        .route(
            "/comments/my-documents",
            get(api::comments::list_my_document_comments_handler),
        )
        .route(
            "/comments/{id}",
            put(api::comments::update_comment_handler).delete(api::comments::delete_comment_handler),
        )
        // Uploads
        .route(
            "/upload",
            post(api::upload::upload_handler).layer(DefaultBodyLimit::max(
                // Multipart framing overhead on top of the file itself.
                api::upload::MAX_UPLOAD_BYTES + 1024 * 1024,
            )),
        )
        .route(
            "/upload/{filename}",
            delete(api::upload::delete_upload_handler),
        )
        .route("/uploads/{filename}", get(api::upload::serve_upload_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
