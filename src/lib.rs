pub mod app;
pub mod auth;
pub mod error;
pub mod api {
    pub mod comments;
    pub mod documents;
    pub mod errors;
    pub mod slides;
    pub mod upload;
}
pub mod db {
    pub mod comment_repository;
    pub mod document_repository;
    #[cfg(test)]
    pub mod mock;
    pub mod models;
    pub mod slide_repository;
}
pub mod rendering {
    pub mod embed;
    pub mod markdown;
}
pub mod storage {
    pub mod client;
}
