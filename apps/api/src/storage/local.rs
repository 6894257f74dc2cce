use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::FileStore;
use crate::errors::AppError;

/// Public disk rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
    url_base: String,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>, url_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_base: url_base.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(path);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Storage(format!("Refusing to write outside root: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalDiskStore {
    async fn put(&self, path: &str, contents: Bytes, _content_type: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&full, &contents)
            .await
            .map_err(|e| AppError::Storage(format!("write {}: {e}", full.display())))?;
        debug!("Stored {} bytes at {}", contents.len(), full.display());
        Ok(())
    }

    fn url_base(&self) -> &str {
        &self.url_base
    }
}
