use crate::models::SeenSet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_SEEN_PATH: &str = "seen_houses.json";

/// Persistence for the seen-set; read and written wholesale
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Never fails: a missing or corrupt record reads as an empty set
    async fn load(&self) -> SeenSet;

    /// Replace the stored record. Last writer wins.
    async fn save(&self, seen: &SeenSet) -> Result<()>;
}

/// Seen-set kept as a JSON array in a single file
pub struct JsonSeenStore {
    path: PathBuf,
}

impl JsonSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SeenStore for JsonSeenStore {
    async fn load(&self) -> SeenSet {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No seen file at {}, starting empty", self.path.display());
                return SeenSet::new();
            }
            Err(e) => {
                warn!("Could not read {}: {}", self.path.display(), e);
                return SeenSet::new();
            }
        };

        match serde_json::from_slice::<SeenSet>(&bytes) {
            Ok(seen) => {
                debug!("Loaded {} seen listings", seen.len());
                seen
            }
            Err(e) => {
                warn!("Ignoring corrupt seen file {}: {}", self.path.display(), e);
                SeenSet::new()
            }
        }
    }

    async fn save(&self, seen: &SeenSet) -> Result<()> {
        let json = serde_json::to_vec_pretty(seen)?;
        let tmp = self.temp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved {} seen listings to {}", seen.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSeenStore::new(dir.path().join("seen.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonSeenStore::new(&path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn wrong_shape_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        tokio::fs::write(&path, br#"{"urls": []}"#).await.unwrap();

        assert!(JsonSeenStore::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSeenStore::new(dir.path().join("state").join("seen.json"));
        let seen = SeenSet::from(vec![
            "https://example.test/b".to_string(),
            "https://example.test/a".to_string(),
        ]);

        store.save(&seen).await.unwrap();
        let loaded = store.load().await;

        assert_eq!(loaded.as_slice(), seen.as_slice());
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSeenStore::new(dir.path().join("seen.json"));

        store
            .save(&SeenSet::from(vec!["https://example.test/1".to_string()]))
            .await
            .unwrap();
        store
            .save(&SeenSet::from(vec!["https://example.test/2".to_string()]))
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        let urls: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(urls, vec!["https://example.test/2".to_string()]);
    }
}
