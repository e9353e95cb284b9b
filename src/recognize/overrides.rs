use crate::models::ItemKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A user-confirmed recognition override for one filename
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideEntry {
    pub item_id: String,
    #[serde(default)]
    pub item_type: Option<ItemKind>,
    #[serde(default)]
    pub grouping_id: Option<String>,
}

/// Durable filename -> catalog-target map, the user-supplied escape hatch
/// for when automatic recognition is wrong or fails. Checked before any
/// remote resolution. Writing to it is a distinct caller-invoked operation;
/// the resolver itself only reads.
pub struct ManualOverrideMap {
    path: PathBuf,
    entries: RwLock<HashMap<String, OverrideEntry>>,
}

impl ManualOverrideMap {
    /// Load the map from the state directory, starting empty when no file
    /// exists yet
    pub async fn load(state_dir: &Path) -> Result<Self, OverrideError> {
        fs::create_dir_all(state_dir).await?;
        let path = state_dir.join("manual_overrides.json");

        let entries = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("ManualOverrideMap: discarding corrupt map: {}", e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Exact-filename lookup
    pub async fn get(&self, filename: &str) -> Option<OverrideEntry> {
        self.entries.read().await.get(filename).cloned()
    }

    /// Record an override and persist the map
    pub async fn insert(
        &self,
        filename: &str,
        entry: OverrideEntry,
    ) -> Result<(), OverrideError> {
        let mut entries = self.entries.write().await;
        entries.insert(filename.to_string(), entry);
        self.persist(&entries).await?;
        info!("ManualOverrideMap: stored override for '{}'", filename);
        Ok(())
    }

    /// Drop an override and persist the map
    pub async fn remove(&self, filename: &str) -> Result<(), OverrideError> {
        let mut entries = self.entries.write().await;
        if entries.remove(filename).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn persist(&self, entries: &HashMap<String, OverrideEntry>) -> Result<(), OverrideError> {
        let bytes = serde_json::to_vec(entries)?;
        fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(item_id: &str) -> OverrideEntry {
        OverrideEntry {
            item_id: item_id.to_string(),
            item_type: Some(ItemKind::Single),
            grouping_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let dir = TempDir::new().unwrap();
        let map = ManualOverrideMap::load(dir.path()).await.unwrap();

        assert!(map.get("a.mkv").await.is_none());
        map.insert("a.mkv", entry("42")).await.unwrap();
        assert_eq!(map.get("a.mkv").await.unwrap().item_id, "42");

        map.remove("a.mkv").await.unwrap();
        assert!(map.get("a.mkv").await.is_none());
    }

    #[tokio::test]
    async fn test_map_survives_reload() {
        let dir = TempDir::new().unwrap();
        {
            let map = ManualOverrideMap::load(dir.path()).await.unwrap();
            map.insert("a.mkv", entry("42")).await.unwrap();
        }

        let reloaded = ManualOverrideMap::load(dir.path()).await.unwrap();
        assert_eq!(reloaded.get("a.mkv").await.unwrap().item_id, "42");
    }
}
