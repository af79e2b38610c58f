use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::boundary::metadata::DEFAULT_LOCALIZED_NAME_TAG;
use crate::cache::config::CacheConfig;
use crate::cache::DistrictCache;
use crate::overpass::config::OverpassConfig;
use crate::overpass::OverpassClient;

/// Read `key` from the environment (`.env` honored) or fall back to `default`.
/// A value that is present but unparsable is an error naming the variable.
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match dotenv::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid value for {}: '{}' ({})", key, raw, e)),
        Err(_) => Ok(default),
    }
}

/// Ingestion knobs that are not client or cache settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Geometry queries in flight at once (the limiter still paces them).
    pub concurrency: usize,
    pub localized_name_tag: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            localized_name_tag: DEFAULT_LOCALIZED_NAME_TAG.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let concurrency: usize = env_or("PIPELINE_CONCURRENCY", defaults.concurrency)?;
        if concurrency == 0 {
            bail!("PIPELINE_CONCURRENCY must be at least 1");
        }
        let localized_name_tag =
            dotenv::var("OVERPASS_LOCALIZED_NAME_TAG").unwrap_or(defaults.localized_name_tag);
        Ok(Self {
            concurrency,
            localized_name_tag,
        })
    }
}

/// Resources shared by every command. Built once in `main`.
pub struct AppState {
    pub overpass: Arc<OverpassClient>,
    pub cache: Arc<DistrictCache>,
    pub pipeline: PipelineConfig,
}

impl AppState {
    pub fn new(overpass: OverpassConfig, cache: CacheConfig, pipeline: PipelineConfig) -> Self {
        Self {
            overpass: Arc::new(OverpassClient::new(overpass)),
            cache: Arc::new(DistrictCache::new(cache)),
            pipeline,
        }
    }

    pub fn from_env() -> Result<Self> {
        let overpass = OverpassConfig::from_env().context("Overpass configuration")?;
        let cache = CacheConfig::from_env().context("cache configuration")?;
        let pipeline = PipelineConfig::from_env().context("pipeline configuration")?;
        Ok(Self::new(overpass, cache, pipeline))
    }

    pub async fn init(&self) -> Result<()> {
        self.overpass.init().await.context("Failed to init Overpass client")?;
        self.cache.init().await.context("Failed to init district cache")?;
        info!(concurrency = self.pipeline.concurrency, "app state ready");
        Ok(())
    }

    /// Close both handles.
    pub async fn close(&self) -> Result<()> {
        self.overpass.close().await;
        self.cache.close().await.context("Failed to close district cache")
    }
}
