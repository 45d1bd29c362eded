//! Profile, wishlist and address actions.

use opticart_core::{
    Address, AddressId, Product, ProductId, ProfileUpdate, StoreError, User, UserId,
};

use super::use_case;
use crate::repository::{AddressRepository, LiveStream, UserRepository};

use_case!(GetProfile => UserRepository);

impl GetProfile {
    #[must_use]
    pub fn execute(&self, user_id: &UserId) -> LiveStream<User> {
        self.repo.profile(user_id)
    }
}

use_case!(UpdateProfile => UserRepository);

impl UpdateProfile {
    /// # Errors
    ///
    /// See [`UserRepository::update_profile`].
    pub async fn execute(&self, user_id: &UserId, update: ProfileUpdate) -> Result<User, StoreError> {
        self.repo.update_profile(user_id, update).await
    }
}

use_case!(GetWishlist => UserRepository);

impl GetWishlist {
    #[must_use]
    pub fn execute(&self, user_id: &UserId) -> LiveStream<Vec<Product>> {
        self.repo.wishlist(user_id)
    }
}

use_case!(
    /// Add or remove a wishlist entry; resolves to the new state.
    ToggleWishlist => UserRepository
);

impl ToggleWishlist {
    /// # Errors
    ///
    /// See [`UserRepository::toggle_wishlist`].
    pub async fn execute(&self, user_id: &UserId, product_id: &ProductId) -> Result<bool, StoreError> {
        self.repo.toggle_wishlist(user_id, product_id).await
    }
}

use_case!(GetAddresses => AddressRepository);

impl GetAddresses {
    #[must_use]
    pub fn execute(&self, user_id: &UserId) -> LiveStream<Vec<Address>> {
        self.repo.addresses(user_id)
    }
}

use_case!(GetAddress => AddressRepository);

impl GetAddress {
    /// # Errors
    ///
    /// See [`AddressRepository::address`].
    pub async fn execute(&self, user_id: &UserId, id: &AddressId) -> Result<Address, StoreError> {
        self.repo.address(user_id, id).await
    }
}

use_case!(SaveAddress => AddressRepository);

impl SaveAddress {
    /// # Errors
    ///
    /// See [`AddressRepository::save_address`].
    pub async fn execute(&self, address: Address) -> Result<AddressId, StoreError> {
        self.repo.save_address(address).await
    }
}

use_case!(DeleteAddress => AddressRepository);

impl DeleteAddress {
    /// # Errors
    ///
    /// See [`AddressRepository::delete_address`].
    pub async fn execute(&self, user_id: &UserId, id: &AddressId) -> Result<(), StoreError> {
        self.repo.delete_address(user_id, id).await
    }
}

use_case!(SetDefaultAddress => AddressRepository);

impl SetDefaultAddress {
    /// # Errors
    ///
    /// See [`AddressRepository::set_default_address`].
    pub async fn execute(&self, user_id: &UserId, id: &AddressId) -> Result<(), StoreError> {
        self.repo.set_default_address(user_id, id).await
    }
}
