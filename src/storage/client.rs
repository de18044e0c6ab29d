use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::AppError;

/// Trait for uploaded-file storage.
///
/// Abstracted as a trait so tests can use a temp directory and the backend
/// stays swappable for an object store later.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Store content under the given key, overwriting any existing object.
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError>;

    /// Retrieve content by key. Returns `None` if the object doesn't exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// Delete an object. Returns `false` if it did not exist.
    async fn delete_object(&self, key: &str) -> Result<bool, AppError>;
}

/// Local-filesystem implementation of StorageClient.
///
/// Mirrors the disk-storage model of the upload flow: one flat directory of
/// uniquely named files. Keys must be bare file names.
pub struct FsStorageClient {
    root: PathBuf,
}

impl FsStorageClient {
    /// Create a client rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| AppError::Storage(format!("Failed to create '{}': {e}", root.display())))?;
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        // Keys are flat file names; anything path-like is refused.
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(AppError::Storage(format!("Invalid storage key '{key}'")));
        }
        Ok(self.root.join(key))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageClient for FsStorageClient {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write '{key}': {e}")))
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read '{key}': {e}"))),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<bool, AppError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!("Failed to delete '{key}': {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (tempfile::TempDir, FsStorageClient) {
        let dir = tempfile::tempdir().unwrap();
        let client = FsStorageClient::new(dir.path()).unwrap();
        (dir, client)
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let (_dir, client) = client();
        client.put_object("a.png", vec![1, 2, 3]).await.unwrap();
        let got = client.get_object("a.png").await.unwrap();
        assert_eq!(got, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let (_dir, client) = client();
        assert_eq!(client.get_object("nope.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (_dir, client) = client();
        client.put_object("x.mp4", vec![0]).await.unwrap();
        assert!(client.delete_object("x.mp4").await.unwrap());
        assert!(!client.delete_object("x.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn path_like_keys_are_refused() {
        let (_dir, client) = client();
        for key in ["../etc/passwd", "a/b.png", "a\\b.png", ""] {
            assert!(client.get_object(key).await.is_err(), "key: {key:?}");
        }
    }
}
