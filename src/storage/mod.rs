use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Unsupported asset URL: {0}")]
    UnsupportedUrl(String),
}

/// Where background assets are published.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `name` and return its public URL.
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Read back an asset by its public URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError>;
}

/// Unique object name keeping the uploaded file's extension,
/// e.g. `20240315_1a2b3c4d.png`.
pub fn generate_object_name(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "png".to_string());
    format!(
        "{}_{}.{}",
        Utc::now().format("%Y%m%d"),
        &Uuid::new_v4().simple().to_string()[..8],
        ext
    )
}

pub fn ensure_dirs(upload_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)
}

fn check_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Files under a local folder, published below a URL prefix that the HTTP
/// server maps back onto the folder. Remote `http(s)` URLs are downloaded.
pub struct LocalStorage {
    root: PathBuf,
    public_prefix: String,
    http: reqwest::Client,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        check_name(name)?;
        tokio::fs::write(self.root.join(name), bytes).await?;
        tracing::info!(name, size = bytes.len(), "Stored object");
        Ok(format!("{}/{}", self.public_prefix, name))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        if let Some(name) = self.local_name(url) {
            check_name(name)?;
            return match tokio::fs::read(self.root.join(name)).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(url.to_string()))
                }
                Err(e) => Err(e.into()),
            };
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self.http.get(url).send().await?.error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }

        Err(StorageError::UnsupportedUrl(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads/");
        let url = storage.upload("bg.png", b"png-bytes").await.unwrap();
        assert_eq!(url, "/uploads/bg.png");
        assert_eq!(storage.fetch(&url).await.unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_unknown_urls() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/uploads");
        assert!(matches!(
            storage.upload("../evil.png", b"x").await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            storage.fetch("/uploads/../secret").await,
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            storage.fetch("/uploads/missing.png").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.fetch("ftp://example.com/a.png").await,
            Err(StorageError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn test_object_names_keep_extension() {
        let name = generate_object_name("Certificate BG.JPG");
        assert!(name.ends_with(".jpg"));
        assert_ne!(name, generate_object_name("Certificate BG.JPG"));
        assert!(generate_object_name("noext").ends_with(".png"));
    }
}
