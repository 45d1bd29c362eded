//! Integration tests for Opticart.
//!
//! # Running Tests
//!
//! ```bash
//! # Flows over the in-memory backend
//! cargo test -p opticart-integration-tests
//!
//! # Including the PostgreSQL round trip
//! OPTICART_TEST_DATABASE_URL=postgres://... cargo test -p opticart-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Sign-up through order history, screen by screen
//! - `session_switch` - User-scoped screens following sign-in and sign-out
//! - `catalog_browsing` - Home filters, product detail, reviews and wishlist
//! - `postgres_backend` - The same repositories over `PostgreSQL`

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{broadcast, watch};

use opticart_core::{Address, AddressId, CurrencyCode, UserId};
use opticart_storefront::backend::AuthSession;
use opticart_storefront::backend::memory::{
    MemoryAuthProvider, MemoryDocumentStore, MemorySettingsStore,
};
use opticart_storefront::seed::{catalog, seed_catalog};
use opticart_storefront::{AppState, StorefrontConfig, UiEvent};

/// How long a screen may take to settle.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Password every test account uses.
pub const PASSWORD: &str = "correct horse";

/// An in-memory app with the demo catalog loaded.
pub async fn seeded_app() -> AppState {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store, &catalog(CurrencyCode::USD), false)
        .await
        .expect("seed demo catalog");
    AppState::from_backends(
        StorefrontConfig::default().in_memory(),
        Arc::new(store),
        Arc::new(MemoryAuthProvider::new()),
        Arc::new(MemorySettingsStore::default()),
    )
}

/// Register and sign in a shopper.
pub async fn sign_up(app: &AppState, display_name: &str, email: &str) -> AuthSession {
    app.use_cases()
        .sign_up
        .execute(display_name, email, &SecretString::from(PASSWORD))
        .await
        .expect("sign up")
}

/// Sign an existing shopper back in.
pub async fn sign_in(app: &AppState, email: &str) -> AuthSession {
    app.use_cases()
        .sign_in
        .execute(email, &SecretString::from(PASSWORD))
        .await
        .expect("sign in")
}

/// Wait for a screen state matching `ready` and return it.
pub async fn settle<S: Clone>(rx: &mut watch::Receiver<S>, ready: impl FnMut(&S) -> bool) -> S {
    let state = tokio::time::timeout(TIMEOUT, rx.wait_for(ready))
        .await
        .expect("screen did not settle in time")
        .expect("view model dropped");
    (*state).clone()
}

/// The next event a screen sends.
pub async fn next_event(rx: &mut broadcast::Receiver<UiEvent>) -> UiEvent {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await
        .expect("no event in time")
        .expect("event channel closed")
}

/// A complete address for `user`.
#[must_use]
pub fn address(user: &UserId, label: &str) -> Address {
    Address {
        id: AddressId::generate(),
        user_id: user.clone(),
        label: label.to_string(),
        recipient: "Jane Doe".to_string(),
        phone: "+1 555 0100".to_string(),
        line1: "1 Lens Lane".to_string(),
        line2: None,
        city: "Portland".to_string(),
        state: "OR".to_string(),
        postal_code: "97201".to_string(),
        country: "US".to_string(),
        is_default: false,
    }
}
