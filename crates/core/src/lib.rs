//! Opticart Core - Shared domain types.
//!
//! This crate provides the types shared by every Opticart component:
//! - `storefront` - Repositories, use cases and per-screen view models
//! - `cli` - Operator tooling (migrations, catalog seeding, demos)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! backend access, no async runtime. Cart arithmetic, order snapshots and
//! search matching live here so they can be tested without a backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for document IDs, prices, emails, and statuses
//! - [`model`] - Entities mirrored one-to-one onto backend documents
//! - [`resource`] - The `Loading`/`Success`/`Error` envelope
//! - [`error`] - The `StoreError` taxonomy carried by that envelope

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod model;
pub mod resource;
pub mod types;

pub use error::StoreError;
pub use model::*;
pub use resource::Resource;
pub use types::*;
