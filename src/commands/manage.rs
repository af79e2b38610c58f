use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::boundary::normalize::parse_multipolygon;
use crate::boundary::types::CityDistricts;
use crate::state::AppState;

/// Remove one city from the cache
pub async fn delete(state: &AppState, city_code: &str) -> Result<()> {
    let existed = state
        .cache
        .delete_city(city_code)
        .await
        .with_context(|| format!("Failed to delete {} from cache", city_code))?;

    if existed {
        println!("Removed '{}' from the cache.", city_code);
    } else {
        println!("'{}' was not cached.", city_code);
    }
    Ok(())
}

/// Drop the whole cache document
pub async fn invalidate(state: &AppState) -> Result<()> {
    state.cache.delete().await.context("Failed to invalidate cache")?;
    info!("cache invalidated from command line");
    println!("Cache invalidated.");
    Ok(())
}

/// Replace the whole cache document with the contents of `path`.
///
/// The file must be a `city_code -> districts` document whose geometries
/// all parse as MULTIPOLYGON WKT. Nothing is written otherwise.
pub async fn restore(state: &AppState, path: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: CityDistricts = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a cache document", path.display()))?;

    for (code, districts) in &document {
        for record in districts {
            if let Err(e) = parse_multipolygon(&record.geometry) {
                bail!(
                    "{}: relation {} in '{}' has bad geometry: {}",
                    path.display(),
                    record.osm_relation_id,
                    code,
                    e
                );
            }
        }
    }

    state.cache.set(&raw).await.context("Failed to write cache")?;
    info!(cities = document.len(), path = %path.display(), "cache restored");
    println!("Restored {} city(ies) from {}.", document.len(), path.display());
    Ok(())
}
