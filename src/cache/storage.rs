use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cnidarium::{StateDelta, StateRead, StateWrite, Storage};
use tracing::debug;

use super::CacheBackend;

/// Cache document persisted in a cnidarium store.
pub struct StorageBackend {
    storage: Storage,
    key: String,
}

impl StorageBackend {
    pub async fn open(data_dir: &Path, key_prefix: &str, key: String) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create cache dir {:?}", data_dir))?;
        let storage = Storage::load(data_dir.to_path_buf(), vec![key_prefix.to_string()])
            .await
            .context("Failed to init cnidarium storage")?;
        Ok(Self { storage, key })
    }
}

#[async_trait]
impl CacheBackend for StorageBackend {
    fn name(&self) -> &'static str {
        "storage"
    }

    async fn get_raw(&self) -> Result<Option<Vec<u8>>> {
        let snapshot = self.storage.latest_snapshot();
        snapshot.get_raw(&self.key).await
    }

    async fn put_raw(&self, value: Vec<u8>) -> Result<()> {
        let size = value.len();
        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        delta.put_raw(self.key.clone(), value);
        self.storage.commit(delta).await?;
        debug!(key = %self.key, size, "cache document stored");
        Ok(())
    }

    async fn delete_raw(&self) -> Result<()> {
        let mut delta = StateDelta::new(self.storage.latest_snapshot());
        delta.delete(self.key.clone());
        self.storage.commit(delta).await?;
        debug!(key = %self.key, "cache document deleted");
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.storage.release().await;
        Ok(())
    }
}
