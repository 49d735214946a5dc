//! Persisted device identity for the discovery fast path
//!
//! After a successful probe the device's USB serial number is written
//! here. On the next start the host can reopen the same device without
//! the Identify exchange. Absence or corruption just means the probing
//! fallback runs; neither is an error.

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialCache {
    pub serial_number: String,
}

impl SerialCache {
    /// Read the cached identity, treating any failure as "no cache"
    pub fn load(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!("Ignoring corrupt device cache at {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn store(&self, path: &Path) -> Result<(), HostError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }
}

/// Platform cache file location, e.g. `~/.cache/rondo/device.toml`
pub fn cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("rondo").join("device.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("rondo-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_store_then_load_roundtrip() {
        let path = temp_path("device.toml");
        let cache = SerialCache {
            serial_number: "E66038B713849A28".into(),
        };
        cache.store(&path).unwrap();
        assert_eq!(SerialCache::load(&path), Some(cache));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_or_corrupt_cache_is_none() {
        assert_eq!(SerialCache::load(Path::new("/nonexistent/device.toml")), None);

        let path = temp_path("corrupt.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "serial_number = ").unwrap();
        assert_eq!(SerialCache::load(&path), None);
        std::fs::remove_file(&path).ok();
    }
}
