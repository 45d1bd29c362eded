//! Shipping addresses (`addresses/{id}`).
//!
//! At most one address per user is the default. Every write that touches
//! the default flag clears it on the other addresses in the same batch.

use std::sync::Arc;

use serde_json::json;
use tracing::instrument;

use opticart_core::{Address, AddressId, StoreError, UserId};

use super::{LiveStream, decode_all, live};
use crate::backend::{Collection, DocumentStore, Query, WriteBatch};

#[derive(Clone)]
pub struct AddressRepository {
    store: Arc<dyn DocumentStore>,
}

impl AddressRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The user's addresses, default first, then by label.
    #[must_use]
    pub fn addresses(&self, user_id: &UserId) -> LiveStream<Vec<Address>> {
        let upstream = self
            .store
            .watch_query(Collection::Addresses, by_user(user_id));
        live(upstream, |docs| {
            let mut addresses: Vec<Address> = decode_all(docs)?;
            sort_addresses(&mut addresses);
            Ok(addresses)
        })
    }

    /// One-shot read of an address owned by `user_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist, `PermissionDenied` if another user
    /// owns it.
    pub async fn address(&self, user_id: &UserId, id: &AddressId) -> Result<Address, StoreError> {
        let address: Address = self
            .store
            .get(Collection::Addresses, id.as_str())
            .await?
            .ok_or_else(|| StoreError::not_found(Collection::Addresses.name(), id.as_str()))?
            .decode()?;
        if &address.user_id != user_id {
            return Err(StoreError::PermissionDenied(
                "address belongs to another user".to_string(),
            ));
        }
        Ok(address)
    }

    /// Create or replace an address.
    ///
    /// A user's first address always becomes the default.
    ///
    /// # Errors
    ///
    /// `Validation` for blank required fields, `PermissionDenied` when
    /// overwriting another user's address, or the backend failure.
    #[instrument(skip(self, address), fields(user = %address.user_id, address = %address.id))]
    pub async fn save_address(&self, mut address: Address) -> Result<AddressId, StoreError> {
        address.validate()?;
        let existing = self.load_all(&address.user_id).await?;

        if let Some(stored) = self
            .store
            .get(Collection::Addresses, address.id.as_str())
            .await?
        {
            let stored: Address = stored.decode()?;
            if stored.user_id != address.user_id {
                return Err(StoreError::PermissionDenied(
                    "address belongs to another user".to_string(),
                ));
            }
        }

        let others: Vec<&Address> = existing.iter().filter(|a| a.id != address.id).collect();
        if others.is_empty() {
            address.is_default = true;
        }

        let mut batch = WriteBatch::new();
        batch.set(Collection::Addresses, address.id.as_str(), &address)?;
        if address.is_default {
            clear_other_defaults(&mut batch, &others);
        } else if !others.iter().any(|a| a.is_default) {
            // Un-defaulting the only default promotes another address.
            if let Some(next) = others.first() {
                batch.merge(
                    Collection::Addresses,
                    next.id.as_str(),
                    json!({"isDefault": true}),
                );
            }
        }
        self.store.commit(batch).await?;
        Ok(address.id)
    }

    /// Make an address the user's default.
    ///
    /// # Errors
    ///
    /// `NotFound`/`PermissionDenied` as for [`address`](Self::address), or
    /// the backend failure.
    #[instrument(skip(self), fields(user = %user_id, address = %id))]
    pub async fn set_default_address(
        &self,
        user_id: &UserId,
        id: &AddressId,
    ) -> Result<(), StoreError> {
        let address = self.address(user_id, id).await?;
        let existing = self.load_all(user_id).await?;
        let others: Vec<&Address> = existing.iter().filter(|a| a.id != address.id).collect();

        let mut batch = WriteBatch::new();
        batch.merge(
            Collection::Addresses,
            address.id.as_str(),
            json!({"isDefault": true}),
        );
        clear_other_defaults(&mut batch, &others);
        self.store.commit(batch).await
    }

    /// Delete an address. Deleting the default promotes the next address.
    ///
    /// # Errors
    ///
    /// `NotFound`/`PermissionDenied` as for [`address`](Self::address), or
    /// the backend failure.
    #[instrument(skip(self), fields(user = %user_id, address = %id))]
    pub async fn delete_address(&self, user_id: &UserId, id: &AddressId) -> Result<(), StoreError> {
        let address = self.address(user_id, id).await?;
        let mut remaining = self.load_all(user_id).await?;
        remaining.retain(|a| a.id != address.id);

        let mut batch = WriteBatch::new();
        batch.delete(Collection::Addresses, address.id.as_str());
        if address.is_default && !remaining.iter().any(|a| a.is_default) {
            if let Some(next) = remaining.first() {
                batch.merge(
                    Collection::Addresses,
                    next.id.as_str(),
                    json!({"isDefault": true}),
                );
            }
        }
        self.store.commit(batch).await
    }

    async fn load_all(&self, user_id: &UserId) -> Result<Vec<Address>, StoreError> {
        let docs = self
            .store
            .query(Collection::Addresses, &by_user(user_id))
            .await?;
        let mut addresses: Vec<Address> = decode_all(docs)?;
        sort_addresses(&mut addresses);
        Ok(addresses)
    }
}

fn by_user(user_id: &UserId) -> Query {
    Query::all().where_eq("userId", user_id.as_str())
}

fn sort_addresses(addresses: &mut [Address]) {
    addresses.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn clear_other_defaults(batch: &mut WriteBatch, others: &[&Address]) {
    for other in others.iter().filter(|a| a.is_default) {
        batch.merge(
            Collection::Addresses,
            other.id.as_str(),
            json!({"isDefault": false}),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryDocumentStore;
    use crate::repository::fixtures::address;

    fn repo() -> AddressRepository {
        AddressRepository::new(Arc::new(MemoryDocumentStore::new()))
    }

    fn defaults(addresses: &[Address]) -> Vec<&str> {
        addresses
            .iter()
            .filter(|a| a.is_default)
            .map(|a| a.label.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_first_address_becomes_default() {
        let repo = repo();
        let user = UserId::new("u1");
        repo.save_address(address("u1", "Home")).await.unwrap();
        let all = repo.load_all(&user).await.unwrap();
        assert_eq!(defaults(&all), vec!["Home"]);
    }

    #[tokio::test]
    async fn test_single_default_is_kept() {
        let repo = repo();
        let user = UserId::new("u1");
        repo.save_address(address("u1", "Home")).await.unwrap();

        let mut office = address("u1", "Office");
        office.is_default = true;
        let office_id = repo.save_address(office).await.unwrap();
        assert_eq!(defaults(&repo.load_all(&user).await.unwrap()), vec!["Office"]);

        let home = repo
            .load_all(&user)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.label == "Home")
            .unwrap();
        repo.set_default_address(&user, &home.id).await.unwrap();
        assert_eq!(defaults(&repo.load_all(&user).await.unwrap()), vec!["Home"]);

        repo.set_default_address(&user, &office_id).await.unwrap();
        let all = repo.load_all(&user).await.unwrap();
        assert_eq!(defaults(&all), vec!["Office"]);
        // Default sorts first.
        assert_eq!(all.first().unwrap().label, "Office");
    }

    #[tokio::test]
    async fn test_deleting_default_promotes_another() {
        let repo = repo();
        let user = UserId::new("u1");
        let home = repo.save_address(address("u1", "Home")).await.unwrap();
        repo.save_address(address("u1", "Office")).await.unwrap();

        repo.delete_address(&user, &home).await.unwrap();
        let all = repo.load_all(&user).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(defaults(&all), vec!["Office"]);
    }

    #[tokio::test]
    async fn test_validation_and_ownership() {
        let repo = repo();
        let mut blank = address("u1", "Home");
        blank.line1 = String::new();
        assert!(matches!(
            repo.save_address(blank).await.unwrap_err(),
            StoreError::Validation(_)
        ));

        let id = repo.save_address(address("u1", "Home")).await.unwrap();
        let err = repo
            .address(&UserId::new("u2"), &id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));

        let mut hijack = address("u2", "Mine");
        hijack.id = id;
        assert!(matches!(
            repo.save_address(hijack).await.unwrap_err(),
            StoreError::PermissionDenied(_)
        ));
    }
}
