//! Entities mirrored one-to-one onto backend documents.
//!
//! Field names are camelCase on the wire. Each entity carries its own
//! document ID; the backend layer injects it when decoding.

pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use cart::{
    Cart, CartItem, EyePrescription, LensCoating, LensOptions, LensType, MAX_LINE_QUANTITY,
    Prescription,
};
pub use order::Order;
pub use product::{Category, FrameAttributes, Product, RatingSummary};
pub use review::Review;
pub use user::{Address, ProfileUpdate, User};
