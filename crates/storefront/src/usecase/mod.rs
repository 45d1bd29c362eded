//! Use cases: one object per application action.
//!
//! Each use case forwards its parameters to exactly one repository method.
//! View models depend on use cases rather than repositories so a screen's
//! capabilities are visible in its constructor.

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod settings;

use crate::repository::Repositories;

pub use account::{
    DeleteAddress, GetAddress, GetAddresses, GetProfile, GetWishlist, SaveAddress,
    SetDefaultAddress, ToggleWishlist, UpdateProfile,
};
pub use auth::{ObserveCurrentUser, SendPasswordReset, SignIn, SignInWithGoogle, SignOut, SignUp};
pub use cart::{AddToCart, ClearCart, GetCart, RemoveFromCart, UpdateCartQuantity};
pub use catalog::{
    AddReview, GetCategories, GetFeaturedProducts, GetProduct, GetProducts,
    GetProductsByCategory, GetReviews, SearchProducts,
};
pub use order::{GetOrder, GetOrders, PlaceOrder};
pub use settings::{ObserveDarkTheme, SetDarkTheme};

/// Declare a use-case struct wrapping one repository.
macro_rules! use_case {
    ($(#[$meta:meta])* $name:ident => $repo:ty) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            repo: $repo,
        }

        impl $name {
            #[must_use]
            pub const fn new(repo: $repo) -> Self {
                Self { repo }
            }
        }
    };
}

pub(crate) use use_case;

/// Every use case, built over one [`Repositories`] bundle.
#[derive(Clone)]
pub struct UseCases {
    // auth
    pub observe_current_user: ObserveCurrentUser,
    pub sign_in: SignIn,
    pub sign_up: SignUp,
    pub sign_in_with_google: SignInWithGoogle,
    pub send_password_reset: SendPasswordReset,
    pub sign_out: SignOut,
    // catalog
    pub get_products: GetProducts,
    pub get_featured_products: GetFeaturedProducts,
    pub get_products_by_category: GetProductsByCategory,
    pub search_products: SearchProducts,
    pub get_product: GetProduct,
    pub get_categories: GetCategories,
    pub get_reviews: GetReviews,
    pub add_review: AddReview,
    // cart
    pub get_cart: GetCart,
    pub add_to_cart: AddToCart,
    pub update_cart_quantity: UpdateCartQuantity,
    pub remove_from_cart: RemoveFromCart,
    pub clear_cart: ClearCart,
    // orders
    pub place_order: PlaceOrder,
    pub get_orders: GetOrders,
    pub get_order: GetOrder,
    // account
    pub get_profile: GetProfile,
    pub update_profile: UpdateProfile,
    pub get_wishlist: GetWishlist,
    pub toggle_wishlist: ToggleWishlist,
    pub get_addresses: GetAddresses,
    pub get_address: GetAddress,
    pub save_address: SaveAddress,
    pub delete_address: DeleteAddress,
    pub set_default_address: SetDefaultAddress,
    // settings
    pub observe_dark_theme: ObserveDarkTheme,
    pub set_dark_theme: SetDarkTheme,
}

impl UseCases {
    #[must_use]
    pub fn new(repos: &Repositories) -> Self {
        Self {
            observe_current_user: ObserveCurrentUser::new(repos.auth.clone()),
            sign_in: SignIn::new(repos.auth.clone()),
            sign_up: SignUp::new(repos.auth.clone()),
            sign_in_with_google: SignInWithGoogle::new(repos.auth.clone()),
            send_password_reset: SendPasswordReset::new(repos.auth.clone()),
            sign_out: SignOut::new(repos.auth.clone()),
            get_products: GetProducts::new(repos.products.clone()),
            get_featured_products: GetFeaturedProducts::new(repos.products.clone()),
            get_products_by_category: GetProductsByCategory::new(repos.products.clone()),
            search_products: SearchProducts::new(repos.products.clone()),
            get_product: GetProduct::new(repos.products.clone()),
            get_categories: GetCategories::new(repos.products.clone()),
            get_reviews: GetReviews::new(repos.reviews.clone()),
            add_review: AddReview::new(repos.reviews.clone()),
            get_cart: GetCart::new(repos.cart.clone()),
            add_to_cart: AddToCart::new(repos.cart.clone()),
            update_cart_quantity: UpdateCartQuantity::new(repos.cart.clone()),
            remove_from_cart: RemoveFromCart::new(repos.cart.clone()),
            clear_cart: ClearCart::new(repos.cart.clone()),
            place_order: PlaceOrder::new(repos.orders.clone()),
            get_orders: GetOrders::new(repos.orders.clone()),
            get_order: GetOrder::new(repos.orders.clone()),
            get_profile: GetProfile::new(repos.users.clone()),
            update_profile: UpdateProfile::new(repos.users.clone()),
            get_wishlist: GetWishlist::new(repos.users.clone()),
            toggle_wishlist: ToggleWishlist::new(repos.users.clone()),
            get_addresses: GetAddresses::new(repos.addresses.clone()),
            get_address: GetAddress::new(repos.addresses.clone()),
            save_address: SaveAddress::new(repos.addresses.clone()),
            delete_address: DeleteAddress::new(repos.addresses.clone()),
            set_default_address: SetDefaultAddress::new(repos.addresses.clone()),
            observe_dark_theme: ObserveDarkTheme::new(repos.settings.clone()),
            set_dark_theme: SetDarkTheme::new(repos.settings.clone()),
        }
    }
}
