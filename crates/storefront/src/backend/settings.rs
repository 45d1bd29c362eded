//! On-device preferences contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use opticart_core::StoreError;

/// User preferences persisted on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub dark_theme: bool,
}

/// An in-place edit applied to [`Settings`].
pub type SettingsEdit = Box<dyn FnOnce(&mut Settings) + Send>;

/// Persistent preferences with a change feed.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Subscribe to the current settings.
    fn settings(&self) -> watch::Receiver<Settings>;

    /// Apply `edit`, persist and publish the result.
    async fn update(&self, edit: SettingsEdit) -> Result<Settings, StoreError>;
}
