//! User profiles and shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{AddressId, Email, ProductId, UserId};

/// A storefront user profile (`users/{uid}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: Email,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Product IDs the user saved for later, most recent last.
    #[serde(default)]
    pub wishlist: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether `product_id` is on the wishlist.
    #[must_use]
    pub fn has_wishlisted(&self, product_id: &ProductId) -> bool {
        self.wishlist.contains(product_id)
    }

    /// Add or remove `product_id`; returns whether it is now wishlisted.
    pub fn toggle_wishlist(&mut self, product_id: &ProductId) -> bool {
        if self.has_wishlisted(product_id) {
            self.wishlist.retain(|id| id != product_id);
            false
        } else {
            self.wishlist.push(product_id.clone());
            true
        }
    }

    /// Apply a profile edit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the display name would be blank.
    pub fn apply(&mut self, update: ProfileUpdate) -> Result<(), StoreError> {
        if let Some(name) = update.display_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::validation("Name cannot be empty"));
            }
            name.clone_into(&mut self.display_name);
        }
        if let Some(phone) = update.phone {
            self.phone = non_blank(phone);
        }
        if let Some(photo_url) = update.photo_url {
            self.photo_url = non_blank(photo_url);
        }
        Ok(())
    }

    /// Initials for the avatar placeholder.
    #[must_use]
    pub fn initials(&self) -> String {
        self.display_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// A partial profile edit. `None` fields are left untouched; blank strings
/// clear optional fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
}

/// A named shipping address owned by a user (`addresses/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    /// Short name such as "Home" or "Office".
    pub label: String,
    pub recipient: String,
    #[serde(default)]
    pub phone: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` naming the first blank required field.
    pub fn validate(&self) -> Result<(), StoreError> {
        let required = [
            ("Label", &self.label),
            ("Recipient", &self.recipient),
            ("Street address", &self.line1),
            ("City", &self.city),
            ("Postal code", &self.postal_code),
            ("Country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::validation(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// Single-line rendering for lists and order summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|l| !l.is_empty()) {
            parts.push(line2);
        }
        parts.push(self.city.as_str());
        if !self.state.is_empty() {
            parts.push(self.state.as_str());
        }
        parts.push(self.postal_code.as_str());
        parts.push(self.country.as_str());
        parts.join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn address(user: &str, label: &str, is_default: bool) -> Address {
        Address {
            id: AddressId::new(format!("{user}-{label}")),
            user_id: UserId::new(user),
            label: label.to_string(),
            recipient: "Jane Doe".to_string(),
            phone: "555-0100".to_string(),
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            is_default,
        }
    }

    fn user() -> User {
        User {
            id: UserId::new("u1"),
            display_name: "jane doe".to_string(),
            email: Email::parse("jane@example.com").unwrap(),
            phone: None,
            photo_url: None,
            wishlist: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_toggle_wishlist() {
        let mut u = user();
        let p = ProductId::new("p1");
        assert!(u.toggle_wishlist(&p));
        assert!(u.has_wishlisted(&p));
        assert!(!u.toggle_wishlist(&p));
        assert!(u.wishlist.is_empty());
    }

    #[test]
    fn test_apply_profile_update() {
        let mut u = user();
        u.apply(ProfileUpdate {
            display_name: Some("  Jane Q. Doe ".into()),
            phone: Some("555-0199".into()),
            photo_url: None,
        })
        .unwrap();
        assert_eq!(u.display_name, "Jane Q. Doe");
        assert_eq!(u.phone.as_deref(), Some("555-0199"));

        u.apply(ProfileUpdate {
            phone: Some("   ".into()),
            ..ProfileUpdate::default()
        })
        .unwrap();
        assert_eq!(u.phone, None);
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut u = user();
        let err = u
            .apply(ProfileUpdate {
                display_name: Some(" ".into()),
                ..ProfileUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(u.display_name, "jane doe");
    }

    #[test]
    fn test_initials() {
        assert_eq!(user().initials(), "JD");
    }

    #[test]
    fn test_address_validation_and_one_line() {
        let mut a = address("u1", "Home", true);
        assert!(a.validate().is_ok());
        assert_eq!(a.one_line(), "1 Main St, Springfield, IL, 62701, US");
        a.city = "  ".into();
        assert!(a.validate().is_err());
    }
}
