use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheBackend;

/// Process-local document slot.
#[derive(Default)]
pub struct MemoryBackend {
    value: RwLock<Option<Vec<u8>>>,
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_raw(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.value.read().await.clone())
    }

    async fn put_raw(&self, value: Vec<u8>) -> Result<()> {
        *self.value.write().await = Some(value);
        Ok(())
    }

    async fn delete_raw(&self) -> Result<()> {
        self.value.write().await.take();
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
