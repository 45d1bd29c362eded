//! Application wiring shared by every screen.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use opticart_core::{AddressId, OrderId, ProductId};

use crate::backend::file_settings::FileSettingsStore;
use crate::backend::memory::{MemoryAuthProvider, MemoryDocumentStore, MemorySettingsStore};
use crate::backend::pg_auth::PgAuthProvider;
use crate::backend::postgres::PgDocumentStore;
use crate::backend::{AuthProvider, DocumentStore, SettingsStore};
use crate::config::{BackendKind, ConfigError, StorefrontConfig};
use crate::db;
use crate::error::Result;
use crate::repository::Repositories;
use crate::usecase::UseCases;
use crate::viewmodel::{
    AddEditAddressViewModel, AddressBookViewModel, AppViewModel, CartViewModel,
    CheckoutViewModel, HomeViewModel, LoginViewModel, OrderDetailViewModel, OrdersViewModel,
    ProductDetailViewModel, ProfileViewModel, RegisterViewModel, SplashViewModel,
    WishlistViewModel,
};

/// Backends, repositories and use cases for one running app.
///
/// Cheap to clone. View models are created per screen from here.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn DocumentStore>,
    pool: Option<PgPool>,
    repositories: Repositories,
    use_cases: UseCases,
}

impl AppState {
    /// Wire the app over the given backends.
    #[must_use]
    pub fn from_backends(
        config: StorefrontConfig,
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self::assemble(config, store, auth, settings, None)
    }

    /// Everything in memory, with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backends(
            StorefrontConfig::default().in_memory(),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryAuthProvider::new()),
            Arc::new(MemorySettingsStore::default()),
        )
    }

    /// Build the backends `config` selects.
    ///
    /// The Postgres backend connects a pool and keeps settings in the file
    /// at `settings_path`. Migrations are not run here.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL is missing or the pool cannot
    /// connect.
    pub async fn connect(config: StorefrontConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Memory => {
                info!("Using in-memory backend");
                let settings = FileSettingsStore::open(config.settings_path.clone()).await;
                Ok(Self::from_backends(
                    config,
                    Arc::new(MemoryDocumentStore::new()),
                    Arc::new(MemoryAuthProvider::new()),
                    Arc::new(settings),
                ))
            }
            BackendKind::Postgres => {
                let url = config
                    .database_url
                    .clone()
                    .ok_or_else(|| ConfigError::MissingEnvVar("OPTICART_DATABASE_URL".into()))?;
                let pool = db::create_pool(&url, config.max_connections).await?;
                info!(max_connections = config.max_connections, "Connected to database");
                let settings = FileSettingsStore::open(config.settings_path.clone()).await;
                let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool.clone()));
                let auth: Arc<dyn AuthProvider> = Arc::new(PgAuthProvider::new(pool.clone()));
                Ok(Self::assemble(
                    config,
                    store,
                    auth,
                    Arc::new(settings),
                    Some(pool),
                ))
            }
        }
    }

    fn assemble(
        config: StorefrontConfig,
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        settings: Arc<dyn SettingsStore>,
        pool: Option<PgPool>,
    ) -> Self {
        let repositories = Repositories::new(Arc::clone(&store), auth, settings);
        let use_cases = UseCases::new(&repositories);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                pool,
                repositories,
                use_cases,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The document store, for operator tooling such as seeding.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// The database pool, when running on Postgres.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn repositories(&self) -> &Repositories {
        &self.inner.repositories
    }

    #[must_use]
    pub fn use_cases(&self) -> &UseCases {
        &self.inner.use_cases
    }

    // -------------------------------------------------------------------------
    // Screens
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn app(&self) -> AppViewModel {
        AppViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn splash(&self) -> SplashViewModel {
        SplashViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn login(&self) -> LoginViewModel {
        LoginViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn register(&self) -> RegisterViewModel {
        RegisterViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn home(&self) -> HomeViewModel {
        HomeViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn product_detail(&self, id: ProductId) -> ProductDetailViewModel {
        ProductDetailViewModel::new(self.use_cases(), id)
    }

    #[must_use]
    pub fn cart(&self) -> CartViewModel {
        CartViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutViewModel {
        CheckoutViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn profile(&self) -> ProfileViewModel {
        ProfileViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn address_book(&self) -> AddressBookViewModel {
        AddressBookViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn add_edit_address(&self, id: Option<AddressId>) -> AddEditAddressViewModel {
        AddEditAddressViewModel::new(self.use_cases(), id)
    }

    #[must_use]
    pub fn orders(&self) -> OrdersViewModel {
        OrdersViewModel::new(self.use_cases())
    }

    #[must_use]
    pub fn order_detail(&self, id: OrderId) -> OrderDetailViewModel {
        OrderDetailViewModel::new(self.use_cases(), id)
    }

    #[must_use]
    pub fn wishlist(&self) -> WishlistViewModel {
        WishlistViewModel::new(self.use_cases())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::viewmodel::ViewModel;

    #[tokio::test]
    async fn test_in_memory_app_starts_at_splash() {
        let app = AppState::in_memory();
        assert_eq!(app.config().backend, BackendKind::Memory);
        assert!(app.pool().is_none());
        let splash = app.splash();
        assert_eq!(
            splash.snapshot().destination,
            Some(crate::navigation::Route::Login)
        );
    }

    #[tokio::test]
    async fn test_connect_memory_uses_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorefrontConfig {
            settings_path: dir.path().join("settings.json"),
            ..StorefrontConfig::default()
        }
        .in_memory();
        let app = AppState::connect(config).await.unwrap();
        app.use_cases().set_dark_theme.execute(true).await.unwrap();
        assert!(dir.path().join("settings.json").exists());
    }
}
