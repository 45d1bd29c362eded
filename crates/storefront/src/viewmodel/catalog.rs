//! Home and product detail screens.

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use opticart_core::{
    Category, CategoryId, LensOptions, MAX_LINE_QUANTITY, Prescription, Product, ProductId,
    RatingSummary, Resource, Review,
};

use super::{
    TaskGroup, TaskSlot, ViewState, follow, launch, loadable, on_user, reject, signed_in,
    view_model,
};
use crate::backend::AuthSession;
use crate::error::report;
use crate::navigation::{Route, UiEvent};
use crate::usecase::{
    AddReview, AddToCart, GetProducts, GetProductsByCategory, GetReviews, SearchProducts,
    ToggleWishlist, UseCases,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HomeState {
    /// Products matching the query and category filter.
    pub products: Vec<Product>,
    pub featured: Vec<Product>,
    pub categories: Vec<Category>,
    pub query: String,
    pub selected_category: Option<CategoryId>,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(HomeState);

pub struct HomeViewModel {
    view: ViewState<HomeState>,
    get_products: GetProducts,
    get_products_by_category: GetProductsByCategory,
    search_products: SearchProducts,
    listing: TaskSlot,
    _tasks: TaskGroup,
}

view_model!(HomeViewModel => HomeState);

impl HomeViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(HomeState::default());
        let mut tasks = TaskGroup::new();
        tasks.push(follow(
            &view,
            use_cases.get_featured_products.execute(),
            "featured",
            |s, featured| s.featured = featured,
        ));
        tasks.push(follow(
            &view,
            use_cases.get_categories.execute(),
            "categories",
            |s, categories| s.categories = categories,
        ));
        let vm = Self {
            view,
            get_products: use_cases.get_products.clone(),
            get_products_by_category: use_cases.get_products_by_category.clone(),
            search_products: use_cases.search_products.clone(),
            listing: TaskSlot::default(),
            _tasks: tasks,
        };
        vm.refresh_listing();
        vm
    }

    /// Change the search query and restart the listing.
    pub fn set_query(&self, query: &str) {
        self.view.update(|s| s.query = query.to_string());
        self.refresh_listing();
    }

    /// Select a category, or `None` for all.
    ///
    /// Selecting the already selected category clears the filter.
    pub fn select_category(&self, category: Option<CategoryId>) {
        self.view.update(|s| {
            s.selected_category = if s.selected_category == category {
                None
            } else {
                category
            };
        });
        self.refresh_listing();
    }

    pub fn open_product(&self, id: &ProductId) {
        self.view
            .emit(UiEvent::Navigate(Route::ProductDetail(id.clone())));
    }

    fn refresh_listing(&self) {
        let (query, category) = {
            let state = self.view.snapshot();
            (state.query.trim().to_string(), state.selected_category)
        };
        let handle = match (query.is_empty(), category) {
            (true, None) => follow(
                &self.view,
                self.get_products.execute(),
                "products",
                |s, products| s.products = products,
            ),
            (true, Some(category)) => follow(
                &self.view,
                self.get_products_by_category.execute(&category),
                "products_by_category",
                |s, products| s.products = products,
            ),
            (false, category) => follow(
                &self.view,
                self.search_products.execute(&query),
                "search",
                move |s, products: Vec<Product>| {
                    s.products = products
                        .into_iter()
                        .filter(|p| category.as_ref().is_none_or(|c| &p.category_id == c))
                        .collect();
                },
            ),
        };
        self.listing.replace(handle);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDetailState {
    pub product: Option<Product>,
    pub reviews: Vec<Review>,
    /// Summary of `reviews`.
    pub rating: RatingSummary,
    pub is_wishlisted: bool,
    /// Quantity to add to the cart.
    pub quantity: u32,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for ProductDetailState {
    fn default() -> Self {
        Self {
            product: None,
            reviews: Vec::new(),
            rating: RatingSummary::default(),
            is_wishlisted: false,
            quantity: 1,
            is_loading: false,
            error: None,
        }
    }
}

loadable!(ProductDetailState);

pub struct ProductDetailViewModel {
    view: ViewState<ProductDetailState>,
    product_id: ProductId,
    users: watch::Receiver<Option<AuthSession>>,
    add_to_cart: AddToCart,
    toggle_wishlist: ToggleWishlist,
    add_review: AddReview,
    _tasks: TaskGroup,
}

view_model!(ProductDetailViewModel => ProductDetailState);

impl ProductDetailViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases, product_id: ProductId) -> Self {
        let view = ViewState::new(ProductDetailState::default());
        let mut tasks = TaskGroup::new();
        tasks.push(follow(
            &view,
            use_cases.get_product.execute(&product_id),
            "product",
            |s, product| s.product = Some(product),
        ));
        tasks.push(follow_reviews(&view, &use_cases.get_reviews, &product_id));

        let get_profile = use_cases.get_profile.clone();
        let pid = product_id.clone();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                let pid = pid.clone();
                let mut profile = get_profile.execute(&session.uid);
                let view = view.clone();
                vec![tokio::spawn(async move {
                    while let Some(resource) = profile.next().await {
                        if let Some(user) = resource.data() {
                            let wishlisted = user.has_wishlisted(&pid);
                            view.update(|s| s.is_wishlisted = wishlisted);
                        }
                    }
                })]
            },
            |s, _| s.is_wishlisted = false,
        ));

        Self {
            view,
            product_id,
            users: use_cases.observe_current_user.execute(),
            add_to_cart: use_cases.add_to_cart.clone(),
            toggle_wishlist: use_cases.toggle_wishlist.clone(),
            add_review: use_cases.add_review.clone(),
            _tasks: tasks,
        }
    }

    /// Set the quantity to add, clamped to `1..=MAX_LINE_QUANTITY`.
    pub fn set_quantity(&self, quantity: u32) {
        self.view
            .update(|s| s.quantity = quantity.clamp(1, MAX_LINE_QUANTITY));
    }

    pub fn increment_quantity(&self) {
        let quantity = self.view.snapshot().quantity;
        self.set_quantity(quantity.saturating_add(1));
    }

    pub fn decrement_quantity(&self) {
        let quantity = self.view.snapshot().quantity;
        self.set_quantity(quantity.saturating_sub(1));
    }

    pub fn add_to_cart(
        &self,
        prescription: Option<Prescription>,
        lens_options: Option<LensOptions>,
    ) -> JoinHandle<()> {
        let Some(session) = self.require_user("add_to_cart") else {
            return tokio::spawn(async {});
        };
        let add = self.add_to_cart.clone();
        let product_id = self.product_id.clone();
        let quantity = self.view.snapshot().quantity;
        launch(
            &self.view,
            "add_to_cart",
            async move {
                add.execute(&session.uid, &product_id, quantity, prescription, lens_options)
                    .await
            },
            |view, _| {
                view.update(|s| s.quantity = 1);
                view.emit(UiEvent::ShowMessage("Added to cart".to_string()));
            },
        )
    }

    pub fn toggle_wishlist(&self) -> JoinHandle<()> {
        let Some(session) = self.require_user("toggle_wishlist") else {
            return tokio::spawn(async {});
        };
        let toggle = self.toggle_wishlist.clone();
        let product_id = self.product_id.clone();
        launch(
            &self.view,
            "toggle_wishlist",
            async move { toggle.execute(&session.uid, &product_id).await },
            |view, wishlisted| {
                view.update(|s| s.is_wishlisted = wishlisted);
                let message = if wishlisted {
                    "Added to wishlist"
                } else {
                    "Removed from wishlist"
                };
                view.emit(UiEvent::ShowMessage(message.to_string()));
            },
        )
    }

    pub fn submit_review(&self, rating: u8, comment: &str) -> JoinHandle<()> {
        let Some(session) = self.require_user("submit_review") else {
            return tokio::spawn(async {});
        };
        let author = session
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| session.email.local_part().to_string());
        let review = match Review::new(
            self.product_id.clone(),
            session.uid.clone(),
            author,
            rating,
            comment,
        ) {
            Ok(review) => review,
            Err(err) => return reject(&self.view, &err, "submit_review"),
        };
        let add = self.add_review.clone();
        launch(
            &self.view,
            "submit_review",
            async move { add.execute(&review).await },
            |view, _| view.emit(UiEvent::ShowMessage("Thanks for your review".to_string())),
        )
    }

    /// The signed-in session; otherwise records the error and sends the
    /// user to the login screen.
    fn require_user(&self, context: &str) -> Option<AuthSession> {
        match signed_in(&self.users) {
            Ok(session) => Some(session),
            Err(err) => {
                drop(reject(&self.view, &err, context));
                self.view.emit(UiEvent::Navigate(Route::Login));
                None
            }
        }
    }
}

/// Reviews load alongside the product; a failure is logged and leaves the
/// list empty rather than replacing the product with an error.
fn follow_reviews(
    view: &ViewState<ProductDetailState>,
    get_reviews: &GetReviews,
    product_id: &ProductId,
) -> JoinHandle<()> {
    let mut reviews = get_reviews.execute(product_id);
    let view = view.clone();
    tokio::spawn(async move {
        while let Some(resource) = reviews.next().await {
            match resource {
                Resource::Success(reviews) => view.update(|s| {
                    s.rating = Review::summarize(&reviews);
                    s.reviews = reviews;
                }),
                Resource::Error(err) => report(&err, "reviews"),
                Resource::Loading => {}
            }
        }
    })
}
