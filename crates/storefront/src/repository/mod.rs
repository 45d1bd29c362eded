//! Repositories: typed access to backend collections.
//!
//! Reads are live streams of [`Resource`]s. Each stream starts with
//! `Loading`, emits `Success` per backend snapshot, and ends after emitting a
//! single `Error`; recovery means subscribing again. Writes are one-shot
//! futures returning `Result`.

pub mod address;
pub mod auth;
pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod settings;
pub mod user;

use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;

use opticart_core::{Resource, StoreError};

use crate::backend::{AuthProvider, DocumentStore, SettingsStore};

pub use address::AddressRepository;
pub use auth::AuthRepository;
pub use cart::CartRepository;
pub use order::OrderRepository;
pub use product::ProductRepository;
pub use review::ReviewRepository;
pub use settings::SettingsRepository;
pub use user::UserRepository;

/// A live read.
pub type LiveStream<T> = BoxStream<'static, Resource<T>>;

/// Wrap a backend listener into a [`LiveStream`].
///
/// `map` turns each snapshot into the domain value; a mapping failure ends
/// the stream the same way a listener failure does.
pub(crate) fn live<U, T, F>(upstream: BoxStream<'static, Result<U, StoreError>>, map: F) -> LiveStream<T>
where
    U: Send + 'static,
    T: Send + 'static,
    F: Fn(U) -> Result<T, StoreError> + Send + 'static,
{
    let mut upstream = upstream;
    stream! {
        yield Resource::Loading;
        while let Some(snapshot) = upstream.next().await {
            match snapshot.and_then(&map) {
                Ok(value) => yield Resource::Success(value),
                Err(err) => {
                    tracing::debug!(error = %err, "Live read ended");
                    yield Resource::Error(err);
                    break;
                }
            }
        }
    }
    .boxed()
}

/// The first settled value of a live read, for one-shot callers.
///
/// # Errors
///
/// Returns the stream's error, or `Backend` if it ends without a value.
pub async fn first_loaded<T>(mut stream: LiveStream<T>) -> Result<T, StoreError> {
    while let Some(resource) = stream.next().await {
        match resource {
            Resource::Loading => {}
            Resource::Success(value) => return Ok(value),
            Resource::Error(err) => return Err(err),
        }
    }
    Err(StoreError::Backend("live read ended without a value".to_string()))
}

/// Decode every document of a query snapshot.
pub(crate) fn decode_all<T: serde::de::DeserializeOwned>(
    docs: Vec<crate::backend::Document>,
) -> Result<Vec<T>, StoreError> {
    docs.iter().map(crate::backend::Document::decode).collect()
}

/// Every repository, sharing one set of backend handles.
#[derive(Clone)]
pub struct Repositories {
    pub auth: AuthRepository,
    pub products: ProductRepository,
    pub cart: CartRepository,
    pub orders: OrderRepository,
    pub reviews: ReviewRepository,
    pub users: UserRepository,
    pub addresses: AddressRepository,
    pub settings: SettingsRepository,
}

impl Repositories {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            auth: AuthRepository::new(auth, Arc::clone(&store)),
            products: ProductRepository::new(Arc::clone(&store)),
            cart: CartRepository::new(Arc::clone(&store)),
            orders: OrderRepository::new(Arc::clone(&store)),
            reviews: ReviewRepository::new(Arc::clone(&store)),
            users: UserRepository::new(Arc::clone(&store)),
            addresses: AddressRepository::new(store),
            settings: SettingsRepository::new(settings),
        }
    }
}
