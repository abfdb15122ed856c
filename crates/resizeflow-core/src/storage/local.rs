use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{object_path, BlobStore, StorageError, StorageResult};

/// Local filesystem blob store.
///
/// Objects live at `{root}/{container}/{key}`; nested keys such as
/// `resized/cat.jpg` become subdirectories.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Unavailable(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `(container, key)` to a path, rejecting anything that could
    /// escape the root.
    fn object_to_path(&self, container: &str, key: &str) -> StorageResult<PathBuf> {
        for part in [container, key] {
            if part.is_empty() || part.starts_with('/') || part.starts_with('\\') {
                return Err(StorageError::InvalidKey(object_path(container, key)));
            }
            let escapes = Path::new(part)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                return Err(StorageError::InvalidKey(object_path(container, key)));
            }
        }
        Ok(self.root.join(container).join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, container: &str, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_to_path(container, key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(object_path(container, key)))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn put(&self, container: &str, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let path = self.object_to_path(container, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file and rename so readers never see a
        // half-written object.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &data).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Stored {} ({} bytes)", path.display(), data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_nested_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        store
            .put("dest", "resized/cat.jpg", b"jpeg".to_vec())
            .await
            .unwrap();

        assert!(dir.path().join("dest/resized/cat.jpg").exists());
        assert_eq!(store.get("dest", "resized/cat.jpg").await.unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        let err = store.get("src", "nope.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        let err = store.get("src", "../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));

        let err = store.put("..", "x.png", vec![]).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
