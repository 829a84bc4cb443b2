use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::dto::UserProfile;

pub const PROFILE_KEY: &str = "calorie_tracker_user_profile";

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `None` when nothing usable is stored. Corrupt records count as nothing.
    async fn load(&self) -> anyhow::Result<Option<UserProfile>>;
    async fn save(&self, profile: &UserProfile) -> anyhow::Result<()>;
    async fn clear(&self) -> anyhow::Result<()>;
}

/// Keeps the profile as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    path: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_key(dir, PROFILE_KEY)
    }

    pub fn with_key(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn load(&self) -> anyhow::Result<Option<UserProfile>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read profile {}", self.path.display()))
            }
        };
        Ok(decode_profile(&raw, &self.path))
    }

    async fn save(&self, profile: &UserProfile) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create data dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec(profile).context("serialize profile")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), "profile saved");
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "profile cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", self.path.display())),
        }
    }
}

fn decode_profile(raw: &[u8], path: &Path) -> Option<UserProfile> {
    match serde_json::from_slice::<UserProfile>(raw) {
        Ok(p) if p.is_valid() => Some(p),
        Ok(_) => {
            warn!(path = %path.display(), "stored profile has invalid values; ignoring it");
            None
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "stored profile is corrupt; ignoring it");
            None
        }
    }
}

/// Process-local store, nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    slot: Mutex<Option<UserProfile>>,
}

impl MemoryProfileStore {
    pub fn with_profile(profile: UserProfile) -> Self {
        Self {
            slot: Mutex::new(Some(profile)),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load(&self) -> anyhow::Result<Option<UserProfile>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("profile slot poisoned"))?;
        Ok(slot.clone())
    }

    async fn save(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("profile slot poisoned"))?;
        *slot = Some(profile.clone());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("profile slot poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod repo_tests {
    use super::*;

    fn sara() -> UserProfile {
        UserProfile {
            name: "Sara".into(),
            weight: 60.0,
            height: 165.0,
            age: 30.0,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_returns_same_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("nested"));
        store.save(&sara()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sara()));
        assert!(store.path().ends_with("calorie_tracker_user_profile.json"));
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path());
        std::fs::write(store.path(), b"{not json").unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn record_with_bad_values_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path());
        std::fs::write(
            store.path(),
            br#"{"name":"Sara","weight":0,"height":165,"age":30}"#,
        )
        .unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_record_and_tolerates_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path());
        store.save(&sara()).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryProfileStore::default();
        assert_eq!(store.load().await.unwrap(), None);
        store.save(&sara()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sara()));
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
