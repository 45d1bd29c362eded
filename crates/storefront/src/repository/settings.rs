//! On-device preferences.

use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;

use opticart_core::StoreError;

use crate::backend::{Settings, SettingsStore};

#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn SettingsStore>,
}

impl SettingsRepository {
    #[must_use]
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Dark-theme flag: the current value, then every change.
    #[must_use]
    pub fn dark_theme(&self) -> BoxStream<'static, bool> {
        let mut rx = self.store.settings();
        stream! {
            let mut last = None;
            loop {
                let dark = rx.borrow_and_update().dark_theme;
                if last != Some(dark) {
                    last = Some(dark);
                    yield dark;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
        .boxed()
    }

    /// Current settings.
    #[must_use]
    pub fn current(&self) -> Settings {
        *self.store.settings().borrow()
    }

    /// Persist the dark-theme flag.
    ///
    /// # Errors
    ///
    /// Returns the storage failure.
    pub async fn set_dark_theme(&self, enabled: bool) -> Result<(), StoreError> {
        self.store
            .update(Box::new(move |s| s.dark_theme = enabled))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::memory::MemorySettingsStore;

    #[tokio::test]
    async fn test_dark_theme_stream_emits_distinct_values() {
        let repo = SettingsRepository::new(Arc::new(MemorySettingsStore::default()));
        let mut stream = repo.dark_theme();
        assert!(!stream.next().await.unwrap());

        repo.set_dark_theme(true).await.unwrap();
        assert!(stream.next().await.unwrap());
        assert!(repo.current().dark_theme);
    }
}
