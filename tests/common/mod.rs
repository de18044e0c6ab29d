use std::sync::Arc;

use axum::Router;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

use deckshare::app::{build_router, AppState};
use deckshare::auth::AuthKeys;
use deckshare::db::comment_repository::{CommentRepository, MongoCommentRepository};
use deckshare::db::document_repository::{DocumentRepository, MongoDocumentRepository};
use deckshare::db::slide_repository::{MongoSlideRepository, SlideRepository};
use deckshare::storage::client::{FsStorageClient, StorageClient};

/// Holds the running MongoDB container and provides the Axum router for
/// integration tests.
///
/// The container is kept alive for as long as this struct lives and is
/// cleaned up on drop. Mongo runs as a single-node replica set because the
/// slide repository uses multi-document transactions.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _upload_dir: tempfile::TempDir,
    pub router: Router,
    pub documents: Arc<dyn DocumentRepository>,
    pub slides: Arc<dyn SlideRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub auth: AuthKeys,
}

impl TestEnv {
    /// Spin up MongoDB and build an Axum router wired to real services.
    pub async fn start() -> Self {
        let mongo_container = Mongo::repl_set()
            .start()
            .await
            .expect("Failed to start MongoDB container");

        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}/?directConnection=true", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database("deckshare_test");

        let documents: Arc<dyn DocumentRepository> =
            Arc::new(MongoDocumentRepository::new(&mongo_db));
        let slides: Arc<dyn SlideRepository> =
            Arc::new(MongoSlideRepository::new(&mongo_client, &mongo_db));
        let comments: Arc<dyn CommentRepository> =
            Arc::new(MongoCommentRepository::new(&mongo_db));

        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
        let storage: Arc<dyn StorageClient> = Arc::new(
            FsStorageClient::new(upload_dir.path()).expect("Failed to open upload directory"),
        );

        let auth = AuthKeys::from_secret("integration-test-secret");

        let state = AppState {
            documents: documents.clone(),
            slides: slides.clone(),
            comments: comments.clone(),
            storage: storage.clone(),
            auth: auth.clone(),
        };

        Self {
            _mongo: mongo_container,
            _upload_dir: upload_dir,
            router: build_router(state),
            documents,
            slides,
            comments,
            storage,
            auth,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder().build(self.router.clone())
    }

    /// Mint a bearer token for the given user.
    pub fn token(&self, user_id: &str) -> String {
        self.auth.issue_token(user_id).expect("Failed to mint token")
    }

    /// Helper: create a document via the API and return its id.
    pub async fn create_document(
        &self,
        server: &axum_test::TestServer,
        user: &str,
        title: &str,
    ) -> String {
        let response = server
            .post("/documents")
            .authorization_bearer(self.token(user))
            .json(&serde_json::json!({ "title": title }))
            .await;
        let body: serde_json::Value = response.json();
        body["id"]
            .as_str()
            .expect("Document response has no id")
            .to_string()
    }

    /// Helper: append a text slide via the API and return its id.
    pub async fn append_slide(
        &self,
        server: &axum_test::TestServer,
        user: &str,
        document_id: &str,
        content: &str,
    ) -> String {
        let response = server
            .post("/slides")
            .authorization_bearer(self.token(user))
            .json(&serde_json::json!({
                "documentId": document_id,
                "content": content,
                "contentType": "text"
            }))
            .await;
        let body: serde_json::Value = response.json();
        body["id"]
            .as_str()
            .expect("Slide response has no id")
            .to_string()
    }

    /// Helper: fetch the slides of a document as (content, order) pairs.
    pub async fn slide_orders(
        &self,
        server: &axum_test::TestServer,
        document_id: &str,
    ) -> Vec<(String, i64)> {
        let response = server.get(&format!("/slides/document/{document_id}")).await;
        let body: serde_json::Value = response.json();
        body.as_array()
            .expect("Expected a slide array")
            .iter()
            .map(|s| {
                (
                    s["content"].as_str().unwrap_or_default().to_string(),
                    s["order"].as_i64().expect("Slide has no order"),
                )
            })
            .collect()
    }
}
