use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::state::env_or;

/// Which store holds the cache document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Durable on-disk cnidarium store.
    Storage,
    /// In-process only; gone after `close()`.
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storage" => Ok(BackendKind::Storage),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown cache backend '{}' (expected storage|memory)", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Storage => write!(f, "storage"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    /// Key prefix (no trailing slash, cnidarium convention).
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Storage,
            data_dir: PathBuf::from("./data/cache"),
            key_prefix: "geo".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let backend = env_or("CACHE_BACKEND", defaults.backend)?;
        let data_dir = dotenv::var("CACHE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let key_prefix = dotenv::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix);

        let key_prefix = key_prefix.trim_end_matches('/').to_string();
        if key_prefix.is_empty() {
            bail!("CACHE_KEY_PREFIX must not be empty");
        }

        Ok(Self {
            backend,
            data_dir,
            key_prefix,
        })
    }

    #[cfg(test)]
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    /// The single key the whole `city_code -> districts` document lives under.
    pub fn document_key(&self) -> String {
        format!("{}/cities_districts_json", self.key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("storage".parse::<BackendKind>(), Ok(BackendKind::Storage));
        assert_eq!(" Memory ".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert!("redis".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_document_key() {
        let config = CacheConfig::default();
        assert_eq!(config.document_key(), "geo/cities_districts_json");
        assert_eq!(config.data_dir, PathBuf::from("./data/cache"));
    }
}
