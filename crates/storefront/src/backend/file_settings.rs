//! Settings persisted as a small JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use opticart_core::StoreError;

use super::settings::SettingsEdit;
use super::{Settings, SettingsStore};

/// Settings store writing `{"darkTheme": bool}` to a file.
pub struct FileSettingsStore {
    path: PathBuf,
    current: watch::Sender<Settings>,
    // Serializes read-modify-write cycles.
    write: Mutex<()>,
}

impl FileSettingsStore {
    /// Load settings from `path`. A missing or unreadable file yields the
    /// defaults; the file is created on the first update.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = load(&path).await;
        let (current, _) = watch::channel(settings);
        Self {
            path,
            current,
            write: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn load(path: &Path) -> Settings {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt settings file");
            Settings::default()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read settings file");
            Settings::default()
        }
    }
}

async fn save(path: &Path, settings: &Settings) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::Backend(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::Backend(format!("rename {}: {e}", path.display())))
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    fn settings(&self) -> watch::Receiver<Settings> {
        self.current.subscribe()
    }

    async fn update(&self, edit: SettingsEdit) -> Result<Settings, StoreError> {
        let _guard = self.write.lock().await;
        let mut next = *self.current.borrow();
        edit(&mut next);
        save(&self.path, &next).await?;
        debug!(path = %self.path.display(), ?next, "Settings saved");
        self.current.send_replace(next);
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::open(dir.path().join("settings.json")).await;
        assert_eq!(*store.settings().borrow(), Settings::default());
    }

    #[tokio::test]
    async fn test_update_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = FileSettingsStore::open(&path).await;
        store
            .update(Box::new(|s| s.dark_theme = true))
            .await
            .unwrap();

        let reopened = FileSettingsStore::open(&path).await;
        assert!(reopened.settings().borrow().dark_theme);
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let store = FileSettingsStore::open(&path).await;
        assert!(!store.settings().borrow().dark_theme);
    }
}
