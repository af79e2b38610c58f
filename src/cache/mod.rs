pub mod config;
pub mod memory;
pub mod storage;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::boundary::types::{CityDistricts, DistrictRecord};
use config::{BackendKind, CacheConfig};
use memory::MemoryBackend;
use storage::StorageBackend;

/// A store holding exactly one opaque document.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get_raw(&self) -> anyhow::Result<Option<Vec<u8>>>;
    async fn put_raw(&self, value: Vec<u8>) -> anyhow::Result<()>;
    async fn delete_raw(&self) -> anyhow::Result<()>;
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("District cache not initialized: call init() first")]
    NotInitialized,

    #[error("Cache storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("Cache document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// The `city_code -> districts` JSON document.
///
/// Access is only valid between `init()` and `close()`. Read-modify-write
/// operations hold `write_lock` for their whole duration.
pub struct DistrictCache {
    config: CacheConfig,
    backend: RwLock<Option<Box<dyn CacheBackend>>>,
    write_lock: Mutex<()>,
}

impl DistrictCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            backend: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn init(&self) -> CacheResult<()> {
        let mut backend = self.backend.write().await;
        if backend.is_some() {
            warn!("DistrictCache.init() called but already initialized");
            return Ok(());
        }

        let opened: Box<dyn CacheBackend> = match self.config.backend {
            BackendKind::Storage => Box::new(
                StorageBackend::open(
                    &self.config.data_dir,
                    &self.config.key_prefix,
                    self.config.document_key(),
                )
                .await
                .map_err(CacheError::Storage)?,
            ),
            BackendKind::Memory => Box::new(MemoryBackend::default()),
        };
        info!(
            backend = opened.name(),
            key = %self.config.document_key(),
            "DistrictCache initialized"
        );
        *backend = Some(opened);
        Ok(())
    }

    pub async fn close(&self) -> CacheResult<()> {
        let mut backend = self.backend.write().await;
        let Some(opened) = backend.take() else {
            warn!("DistrictCache.close() called but not initialized");
            return Ok(());
        };
        opened.close().await.map_err(CacheError::Storage)?;
        info!("DistrictCache closed");
        Ok(())
    }

    /// The raw document, if any.
    pub async fn get(&self) -> CacheResult<Option<String>> {
        let guard = self.backend.read().await;
        let backend = guard.as_ref().ok_or(CacheError::NotInitialized)?;
        let Some(bytes) = backend.get_raw().await.map_err(CacheError::Storage)? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| CacheError::Storage(e.into()))
    }

    /// Overwrite the whole document.
    pub async fn set(&self, value: &str) -> CacheResult<()> {
        let _write = self.write_lock.lock().await;
        self.put_locked(value.as_bytes().to_vec()).await
    }

    /// Drop the whole document. Deleting an absent document is fine.
    pub async fn delete(&self) -> CacheResult<()> {
        let _write = self.write_lock.lock().await;
        let guard = self.backend.read().await;
        let backend = guard.as_ref().ok_or(CacheError::NotInitialized)?;
        backend.delete_raw().await.map_err(CacheError::Storage)?;
        info!("district cache invalidated");
        Ok(())
    }

    /// Remove one city. Returns whether the city was present.
    ///
    /// A document that is not valid JSON is deleted outright and reported
    /// as `false`. Valid JSON that is not an object is left as is.
    pub async fn delete_city(&self, city_code: &str) -> CacheResult<bool> {
        let _write = self.write_lock.lock().await;
        let Some(raw) = self.get().await? else {
            return Ok(false);
        };

        let mut value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "cache document corrupt, deleting it");
                let guard = self.backend.read().await;
                let backend = guard.as_ref().ok_or(CacheError::NotInitialized)?;
                backend.delete_raw().await.map_err(CacheError::Storage)?;
                return Ok(false);
            }
        };

        let Some(document) = value.as_object_mut() else {
            warn!("cache document is not a JSON object, leaving it untouched");
            return Ok(false);
        };
        if document.remove(city_code).is_none() {
            return Ok(false);
        }
        self.put_locked(serde_json::to_vec(&value)?).await?;
        info!(city_code, "city removed from cache");
        Ok(true)
    }

    /// The parsed document, if any.
    pub async fn get_document(&self) -> CacheResult<Option<CityDistricts>> {
        match self.get().await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Replace one city's entry, leaving other cities untouched. An empty
    /// `records` removes the entry instead.
    pub async fn put_city(&self, city_code: &str, records: Vec<DistrictRecord>) -> CacheResult<()> {
        let _write = self.write_lock.lock().await;
        let mut document = self.get_document().await?.unwrap_or_default();

        if records.is_empty() {
            if document.remove(city_code).is_none() {
                debug!(city_code, "no districts and no cached entry, nothing to write");
                return Ok(());
            }
            info!(city_code, "no districts reconstructed, cached entry removed");
        } else {
            info!(city_code, districts = records.len(), "caching districts");
            document.insert(city_code.to_string(), records);
        }

        self.put_locked(serde_json::to_vec(&document)?).await
    }

    /// Caller must hold `write_lock`.
    async fn put_locked(&self, value: Vec<u8>) -> CacheResult<()> {
        let guard = self.backend.read().await;
        let backend = guard.as_ref().ok_or(CacheError::NotInitialized)?;
        backend.put_raw(value).await.map_err(CacheError::Storage)
    }
}
