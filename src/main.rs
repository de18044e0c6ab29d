use std::sync::Arc;

use deckshare::app::{build_router, AppConfig, AppState};
use deckshare::auth::AuthKeys;
use deckshare::db::comment_repository::MongoCommentRepository;
use deckshare::db::document_repository::MongoDocumentRepository;
use deckshare::db::slide_repository::MongoSlideRepository;
use deckshare::storage::client::FsStorageClient;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckshare=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("Starting Deckshare server...");

    let config = AppConfig::from_env();

    // Connect to MongoDB
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .expect("Failed to connect to MongoDB");
    let mongo_db = mongo_client.database(&config.mongodb_database);

    tracing::info!("Connected to MongoDB at {}", config.mongodb_uri);

    let storage = FsStorageClient::new(&config.upload_dir).expect("Failed to open upload directory");

    let state = AppState {
        documents: Arc::new(MongoDocumentRepository::new(&mongo_db)),
        slides: Arc::new(MongoSlideRepository::new(&mongo_client, &mongo_db)),
        comments: Arc::new(MongoCommentRepository::new(&mongo_db)),
        storage: Arc::new(storage),
        auth: AuthKeys::from_secret(&config.auth_secret),
    };

    let app = build_router(state);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
