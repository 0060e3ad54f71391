use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use orbit_common::ElementSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Last successful candidate set for one (filter, limit) request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub saved_at: DateTime<Utc>,
    pub filter_id: Option<String>,
    pub limit: usize,
    pub sets: Vec<ElementSet>,
}

/// Last-known-good element sets on disk.
///
/// Used only when every retry has failed, so that the views can keep showing
/// stale positions behind a visible notice instead of an empty scene.
pub struct SnapshotCache {
    cache_dir: PathBuf,
}

impl SnapshotCache {
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub async fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)
                .await
                .context("Failed to create cache directory")?;
            info!("Created cache directory: {:?}", self.cache_dir);
        }
        Ok(())
    }

    fn snapshot_path(&self, filter_id: Option<&str>, limit: usize) -> PathBuf {
        let key: String = filter_id
            .unwrap_or("active")
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.cache_dir
            .join(format!("element_sets_{}_{}.json", key, limit))
    }

    pub async fn save(&self, filter_id: Option<&str>, limit: usize, sets: &[ElementSet]) -> Result<()> {
        self.ensure_cache_dir().await?;

        let snapshot = ElementSnapshot {
            saved_at: Utc::now(),
            filter_id: filter_id.map(str::to_string),
            limit,
            sets: sets.to_vec(),
        };
        let content = serde_json::to_string(&snapshot).context("Failed to serialize snapshot")?;

        let path = self.snapshot_path(filter_id, limit);
        fs::write(&path, content)
            .await
            .context("Failed to write snapshot file")?;

        debug!("Saved {} element sets to {:?}", sets.len(), path);
        Ok(())
    }

    /// `Ok(None)` when nothing was ever saved for this request
    pub async fn load(&self, filter_id: Option<&str>, limit: usize) -> Result<Option<ElementSnapshot>> {
        let path = self.snapshot_path(filter_id, limit);

        if !path.exists() {
            debug!("No snapshot at {:?}", path);
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .context("Failed to read snapshot file")?;
        let snapshot: ElementSnapshot =
            serde_json::from_str(&content).context("Failed to parse snapshot file")?;

        info!(
            "Loaded snapshot of {} element sets saved at {}",
            snapshot.sets.len(),
            snapshot.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_snapshot_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(temp_dir.path().join("nested"));

        let sets = vec![ElementSet::new(25544, "ISS (ZARYA)", "1 a", "2 b")];
        cache.save(Some("starlink"), 600, &sets).await.unwrap();

        let loaded = cache.load(Some("STARLINK"), 600).await.unwrap().unwrap();
        assert_eq!(loaded.sets, sets);
        assert_eq!(loaded.limit, 600);

        assert!(cache.load(Some("starlink"), 300).await.unwrap().is_none());
        assert!(cache.load(None, 600).await.unwrap().is_none());
    }

    #[test]
    fn test_snapshot_path_is_sanitized() {
        let cache = SnapshotCache::new("/tmp/x");
        let path = cache.snapshot_path(Some("../Jilin 1"), 10);
        assert_eq!(path.file_name().unwrap(), "element_sets____jilin_1_10.json");
    }
}
