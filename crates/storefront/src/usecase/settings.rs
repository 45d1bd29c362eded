//! Preference actions.

use futures::stream::BoxStream;

use opticart_core::StoreError;

use super::use_case;
use crate::repository::SettingsRepository;

use_case!(ObserveDarkTheme => SettingsRepository);

impl ObserveDarkTheme {
    #[must_use]
    pub fn execute(&self) -> BoxStream<'static, bool> {
        self.repo.dark_theme()
    }
}

use_case!(SetDarkTheme => SettingsRepository);

impl SetDarkTheme {
    /// # Errors
    ///
    /// See [`SettingsRepository::set_dark_theme`].
    pub async fn execute(&self, enabled: bool) -> Result<(), StoreError> {
        self.repo.set_dark_theme(enabled).await
    }
}
