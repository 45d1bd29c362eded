//! Profile, address book and wishlist screens.

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use opticart_core::{
    Address, AddressId, Product, ProductId, ProfileUpdate, StoreError, User, UserId,
};

use super::{
    Loadable, TaskGroup, ViewState, follow, launch, loadable, on_user, reject, reset_for_user,
    signed_in, view_model,
};
use crate::backend::AuthSession;
use crate::navigation::{Route, UiEvent};
use crate::usecase::{
    DeleteAddress, GetAddress, SaveAddress, SetDarkTheme, SetDefaultAddress, SignOut,
    ToggleWishlist, UpdateProfile, UseCases,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub user: Option<User>,
    pub dark_theme: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(ProfileState);

pub struct ProfileViewModel {
    view: ViewState<ProfileState>,
    users: watch::Receiver<Option<AuthSession>>,
    update_profile: UpdateProfile,
    set_dark_theme: SetDarkTheme,
    sign_out: SignOut,
    _tasks: TaskGroup,
}

view_model!(ProfileViewModel => ProfileState);

impl ProfileViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(ProfileState::default());
        let get_profile = use_cases.get_profile.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                vec![follow(
                    view,
                    get_profile.execute(&session.uid),
                    "profile",
                    |s, user| s.user = Some(user),
                )]
            },
            |s, signed_in| {
                let dark_theme = s.dark_theme;
                reset_for_user(s, signed_in);
                s.dark_theme = dark_theme;
            },
        ));

        let mut theme = use_cases.observe_dark_theme.execute();
        let theme_view = view.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(dark) = theme.next().await {
                theme_view.update(|s| s.dark_theme = dark);
            }
        }));

        Self {
            view,
            users: use_cases.observe_current_user.execute(),
            update_profile: use_cases.update_profile.clone(),
            set_dark_theme: use_cases.set_dark_theme.clone(),
            sign_out: use_cases.sign_out.clone(),
            _tasks: tasks,
        }
    }

    pub fn update_profile(&self, update: ProfileUpdate) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "update_profile"),
        };
        let update_profile = self.update_profile.clone();
        launch(
            &self.view,
            "update_profile",
            async move { update_profile.execute(&session.uid, update).await },
            |view, user| {
                view.update(|s| s.user = Some(user));
                view.emit(UiEvent::ShowMessage("Profile updated".to_string()));
            },
        )
    }

    pub fn toggle_dark_theme(&self) -> JoinHandle<()> {
        let enabled = !self.view.snapshot().dark_theme;
        let set = self.set_dark_theme.clone();
        launch(
            &self.view,
            "set_dark_theme",
            async move { set.execute(enabled).await },
            |_, ()| {},
        )
    }

    pub fn sign_out(&self) -> JoinHandle<()> {
        let sign_out = self.sign_out.clone();
        launch(
            &self.view,
            "sign_out",
            async move { sign_out.execute().await },
            |view, ()| view.emit(UiEvent::Navigate(Route::Login)),
        )
    }

    /// Navigate to another account screen.
    pub fn open(&self, route: Route) {
        self.view.emit(UiEvent::Navigate(route));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressBookState {
    /// Default first, then by label.
    pub addresses: Vec<Address>,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(AddressBookState);

pub struct AddressBookViewModel {
    view: ViewState<AddressBookState>,
    users: watch::Receiver<Option<AuthSession>>,
    delete_address: DeleteAddress,
    set_default_address: SetDefaultAddress,
    _tasks: TaskGroup,
}

view_model!(AddressBookViewModel => AddressBookState);

impl AddressBookViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(AddressBookState::default());
        let get_addresses = use_cases.get_addresses.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                vec![follow(
                    view,
                    get_addresses.execute(&session.uid),
                    "addresses",
                    |s, addresses| s.addresses = addresses,
                )]
            },
            reset_for_user,
        ));
        Self {
            view,
            users: use_cases.observe_current_user.execute(),
            delete_address: use_cases.delete_address.clone(),
            set_default_address: use_cases.set_default_address.clone(),
            _tasks: tasks,
        }
    }

    pub fn delete(&self, id: &AddressId) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "delete_address"),
        };
        let delete = self.delete_address.clone();
        let id = id.clone();
        launch(
            &self.view,
            "delete_address",
            async move { delete.execute(&session.uid, &id).await },
            |view, ()| view.emit(UiEvent::ShowMessage("Address deleted".to_string())),
        )
    }

    pub fn set_default(&self, id: &AddressId) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "set_default_address"),
        };
        let set_default = self.set_default_address.clone();
        let id = id.clone();
        launch(
            &self.view,
            "set_default_address",
            async move { set_default.execute(&session.uid, &id).await },
            |_, ()| {},
        )
    }

    pub fn add(&self) {
        self.view
            .emit(UiEvent::Navigate(Route::AddEditAddress(None)));
    }

    pub fn edit(&self, id: &AddressId) {
        self.view
            .emit(UiEvent::Navigate(Route::AddEditAddress(Some(id.clone()))));
    }
}

/// Editable address fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressForm {
    pub label: String,
    pub recipient: String,
    pub phone: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl AddressForm {
    fn from_address(address: &Address) -> Self {
        Self {
            label: address.label.clone(),
            recipient: address.recipient.clone(),
            phone: address.phone.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone().unwrap_or_default(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            is_default: address.is_default,
        }
    }

    fn to_address(&self, id: AddressId, user_id: UserId) -> Address {
        let line2 = self.line2.trim();
        Address {
            id,
            user_id,
            label: self.label.trim().to_string(),
            recipient: self.recipient.trim().to_string(),
            phone: self.phone.trim().to_string(),
            line1: self.line1.trim().to_string(),
            line2: (!line2.is_empty()).then(|| line2.to_string()),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self.country.trim().to_string(),
            is_default: self.is_default,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddEditAddressState {
    pub form: AddressForm,
    /// The address being edited; `None` when adding.
    pub editing: Option<AddressId>,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(AddEditAddressState);

pub struct AddEditAddressViewModel {
    view: ViewState<AddEditAddressState>,
    users: watch::Receiver<Option<AuthSession>>,
    save_address: SaveAddress,
    _tasks: TaskGroup,
}

view_model!(AddEditAddressViewModel => AddEditAddressState);

impl AddEditAddressViewModel {
    /// Open the form, loading the address first when `editing` is set.
    #[must_use]
    pub fn new(use_cases: &UseCases, editing: Option<AddressId>) -> Self {
        let view = ViewState::new(AddEditAddressState {
            editing: editing.clone(),
            ..AddEditAddressState::default()
        });
        let mut tasks = TaskGroup::new();
        if let Some(id) = editing {
            let get_address = use_cases.get_address.clone();
            tasks.push(on_user(
                &view,
                use_cases.observe_current_user.execute(),
                move |view, session| vec![load_address(view, &get_address, &session.uid, &id)],
                |s, signed_in| {
                    s.form = AddressForm::default();
                    if !signed_in {
                        s.set_error(Some(StoreError::Unauthenticated.user_message()));
                    }
                },
            ));
        }
        Self {
            view,
            users: use_cases.observe_current_user.execute(),
            save_address: use_cases.save_address.clone(),
            _tasks: tasks,
        }
    }

    /// Edit the form in place.
    pub fn edit_form(&self, edit: impl FnOnce(&mut AddressForm)) {
        self.view.update(|s| edit(&mut s.form));
    }

    /// Validate and save, then go back.
    pub fn save(&self) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "save_address"),
        };
        let state = self.view.snapshot();
        let id = state.editing.unwrap_or_else(AddressId::generate);
        let address = state.form.to_address(id, session.uid);
        if let Err(err) = address.validate() {
            return reject(&self.view, &err, "save_address");
        }
        let save = self.save_address.clone();
        launch(
            &self.view,
            "save_address",
            async move { save.execute(address).await },
            |view, _| {
                view.emit(UiEvent::ShowMessage("Address saved".to_string()));
                view.emit(UiEvent::NavigateBack);
            },
        )
    }
}

fn load_address(
    view: &ViewState<AddEditAddressState>,
    get_address: &GetAddress,
    user_id: &UserId,
    id: &AddressId,
) -> JoinHandle<()> {
    let get_address = get_address.clone();
    let user_id = user_id.clone();
    let id = id.clone();
    launch(
        view,
        "load_address",
        async move { get_address.execute(&user_id, &id).await },
        |view, address| view.update(|s| s.form = AddressForm::from_address(&address)),
    )
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WishlistState {
    pub products: Vec<Product>,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(WishlistState);

pub struct WishlistViewModel {
    view: ViewState<WishlistState>,
    users: watch::Receiver<Option<AuthSession>>,
    toggle_wishlist: ToggleWishlist,
    _tasks: TaskGroup,
}

view_model!(WishlistViewModel => WishlistState);

impl WishlistViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(WishlistState::default());
        let get_wishlist = use_cases.get_wishlist.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                vec![follow(
                    view,
                    get_wishlist.execute(&session.uid),
                    "wishlist",
                    |s, products| s.products = products,
                )]
            },
            reset_for_user,
        ));
        Self {
            view,
            users: use_cases.observe_current_user.execute(),
            toggle_wishlist: use_cases.toggle_wishlist.clone(),
            _tasks: tasks,
        }
    }

    pub fn remove(&self, product_id: &ProductId) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "remove_from_wishlist"),
        };
        let toggle = self.toggle_wishlist.clone();
        let product_id = product_id.clone();
        let listed = self
            .view
            .snapshot()
            .products
            .iter()
            .any(|p| p.id == product_id);
        if !listed {
            return reject(
                &self.view,
                &StoreError::not_found("wishlist", product_id.as_str()),
                "remove_from_wishlist",
            );
        }
        launch(
            &self.view,
            "remove_from_wishlist",
            async move { toggle.execute(&session.uid, &product_id).await },
            |view, _| view.emit(UiEvent::ShowMessage("Removed from wishlist".to_string())),
        )
    }

    pub fn open_product(&self, id: &ProductId) {
        self.view
            .emit(UiEvent::Navigate(Route::ProductDetail(id.clone())));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{address, insert_product, product};
    use crate::viewmodel::ViewModel;
    use crate::viewmodel::testing::{harness, next_event, wait_for};

    #[tokio::test]
    async fn test_profile_update_theme_and_sign_out() {
        let h = harness();
        h.sign_up("jane@example.com").await;
        let vm = ProfileViewModel::new(&h.use_cases);
        let mut state = vm.state();
        let loaded = wait_for(&mut state, |s| s.user.is_some()).await;
        assert_eq!(loaded.user.unwrap().display_name, "Jane Doe");
        assert!(!loaded.dark_theme);

        vm.update_profile(ProfileUpdate {
            display_name: Some("Jane Q".into()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap();
        wait_for(&mut state, |s| {
            s.user.as_ref().is_some_and(|u| u.display_name == "Jane Q")
        })
        .await;

        vm.toggle_dark_theme().await.unwrap();
        wait_for(&mut state, |s| s.dark_theme).await;

        let mut events = vm.events();
        vm.sign_out().await.unwrap();
        assert_eq!(next_event(&mut events).await, UiEvent::Navigate(Route::Login));
        let signed_out = wait_for(&mut state, |s| s.user.is_none()).await;
        assert!(signed_out.dark_theme);
    }

    #[tokio::test]
    async fn test_add_then_edit_address() {
        let h = harness();
        let session = h.sign_up("jane@example.com").await;

        let add = AddEditAddressViewModel::new(&h.use_cases, None);
        add.edit_form(|f| f.label = "Home".into());
        add.save().await.unwrap();
        assert_eq!(add.snapshot().error.as_deref(), Some("Recipient is required"));

        add.edit_form(|f| {
            f.recipient = "Jane Doe".into();
            f.line1 = "1 Main St".into();
            f.city = "Springfield".into();
            f.postal_code = "62701".into();
            f.country = "US".into();
        });
        let mut events = add.events();
        add.save().await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            UiEvent::ShowMessage("Address saved".into())
        );
        assert_eq!(next_event(&mut events).await, UiEvent::NavigateBack);

        let book = AddressBookViewModel::new(&h.use_cases);
        let mut book_state = book.state();
        let listed = wait_for(&mut book_state, |s| s.addresses.len() == 1).await;
        let saved = listed.addresses.first().unwrap().clone();
        assert!(saved.is_default);
        assert_eq!(saved.user_id, session.uid);

        let edit = AddEditAddressViewModel::new(&h.use_cases, Some(saved.id.clone()));
        let mut edit_state = edit.state();
        let loaded = wait_for(&mut edit_state, |s| s.form.label == "Home").await;
        assert_eq!(loaded.form.city, "Springfield");
        edit.edit_form(|f| f.label = "Cottage".into());
        edit.save().await.unwrap();
        wait_for(&mut book_state, |s| {
            s.addresses.first().is_some_and(|a| a.label == "Cottage")
        })
        .await;
    }

    #[tokio::test]
    async fn test_address_book_default_and_delete() {
        let h = harness();
        let session = h.sign_up("jane@example.com").await;
        let uid = session.uid.as_str();
        let first = h
            .use_cases
            .save_address
            .execute(address(uid, "A"))
            .await
            .unwrap();
        let second = h
            .use_cases
            .save_address
            .execute(address(uid, "B"))
            .await
            .unwrap();

        let book = AddressBookViewModel::new(&h.use_cases);
        let mut state = book.state();
        wait_for(&mut state, |s| s.addresses.len() == 2).await;

        book.set_default(&second).await.unwrap();
        let switched = wait_for(&mut state, |s| {
            s.addresses.first().is_some_and(|a| a.id == second && a.is_default)
        })
        .await;
        assert_eq!(switched.addresses.iter().filter(|a| a.is_default).count(), 1);

        book.delete(&second).await.unwrap();
        let promoted = wait_for(&mut state, |s| s.addresses.len() == 1).await;
        let remaining = promoted.addresses.first().unwrap();
        assert_eq!(remaining.id, first);
        assert!(remaining.is_default);
    }

    #[tokio::test]
    async fn test_wishlist_remove() {
        let h = harness();
        let session = h.sign_up("jane@example.com").await;
        let frames = product("p1", 10, 1);
        insert_product(&h.store, &frames).await;
        h.use_cases
            .toggle_wishlist
            .execute(&session.uid, &frames.id)
            .await
            .unwrap();

        let vm = WishlistViewModel::new(&h.use_cases);
        let mut state = vm.state();
        wait_for(&mut state, |s| s.products.len() == 1).await;
        vm.remove(&frames.id).await.unwrap();
        wait_for(&mut state, |s| s.products.is_empty() && !s.is_loading).await;

        vm.remove(&frames.id).await.unwrap();
        assert!(vm.snapshot().error.is_some());
    }
}
