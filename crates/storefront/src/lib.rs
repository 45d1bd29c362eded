//! Opticart storefront library.
//!
//! Layers, bottom up:
//!
//! - [`backend`] - the document store, auth provider and settings store,
//!   with in-memory, `PostgreSQL` and file implementations
//! - [`repository`] - typed data access, one repository per aggregate
//! - [`usecase`] - single-purpose operations the screens call
//! - [`viewmodel`] - per-screen state holders and one-shot UI events
//!
//! [`state::AppState`] wires them together from a [`config::StorefrontConfig`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod navigation;
pub mod repository;
pub mod screen;
pub mod seed;
pub mod state;
pub mod usecase;
pub mod viewmodel;

pub use config::{BackendKind, ConfigError, StorefrontConfig};
pub use error::AppError;
pub use navigation::{Route, UiEvent};
pub use state::AppState;
pub use viewmodel::{ViewModel, ViewState};
