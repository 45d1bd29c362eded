//! Screen routes and the one-shot events that drive the navigation host.

use std::fmt;

use opticart_core::{AddressId, OrderId, ProductId};

/// A navigable screen.
///
/// Paths are flat slash-separated strings. Parameterised routes carry their
/// document ID as the final segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Splash,
    Login,
    Register,
    Home,
    ProductDetail(ProductId),
    Cart,
    Checkout,
    Profile,
    Addresses,
    /// `None` adds a new address; `Some` edits an existing one.
    AddEditAddress(Option<AddressId>),
    Orders,
    OrderDetail(OrderId),
    Wishlist,
}

impl Route {
    /// The screen shown at launch.
    pub const START: Self = Self::Splash;

    /// The route's path.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Splash => "splash".to_string(),
            Self::Login => "login".to_string(),
            Self::Register => "register".to_string(),
            Self::Home => "home".to_string(),
            Self::ProductDetail(id) => format!("product/{id}"),
            Self::Cart => "cart".to_string(),
            Self::Checkout => "checkout".to_string(),
            Self::Profile => "profile".to_string(),
            Self::Addresses => "addresses".to_string(),
            Self::AddEditAddress(None) => "address/edit".to_string(),
            Self::AddEditAddress(Some(id)) => format!("address/edit/{id}"),
            Self::Orders => "orders".to_string(),
            Self::OrderDetail(id) => format!("order/{id}"),
            Self::Wishlist => "wishlist".to_string(),
        }
    }

    /// Parse a path produced by [`Route::path`].
    ///
    /// A leading `/` is accepted. Empty ID segments are rejected.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim().trim_start_matches('/');
        let segments: Vec<&str> = path.split('/').collect();
        let route = match segments.as_slice() {
            ["splash"] => Self::Splash,
            ["login"] => Self::Login,
            ["register"] => Self::Register,
            ["home"] => Self::Home,
            ["product", id] if !id.is_empty() => Self::ProductDetail(ProductId::new(*id)),
            ["cart"] => Self::Cart,
            ["checkout"] => Self::Checkout,
            ["profile"] => Self::Profile,
            ["addresses"] => Self::Addresses,
            ["address", "edit"] => Self::AddEditAddress(None),
            ["address", "edit", id] if !id.is_empty() => {
                Self::AddEditAddress(Some(AddressId::new(*id)))
            }
            ["orders"] => Self::Orders,
            ["order", id] if !id.is_empty() => Self::OrderDetail(OrderId::new(*id)),
            ["wishlist"] => Self::Wishlist,
            _ => return None,
        };
        Some(route)
    }

    /// Whether the screen needs a signed-in user.
    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        !matches!(
            self,
            Self::Splash | Self::Login | Self::Register | Self::Home | Self::ProductDetail(_)
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// One-shot instruction from a view model to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Navigate(Route),
    /// Pop the current screen.
    NavigateBack,
    /// Transient message (toast / snackbar).
    ShowMessage(String),
}
