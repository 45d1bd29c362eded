//! Per-screen view models.
//!
//! A view model owns a [`ViewState`]: a `watch` channel holding the latest
//! immutable state snapshot plus a `broadcast` channel of one-shot
//! [`UiEvent`]s. Repository streams are folded into the snapshot by tasks the
//! view model owns; those tasks are aborted when the view model is dropped.
//! Writes run as detached tasks and are allowed to finish after the screen
//! goes away.
//!
//! User-scoped screens follow the current-user channel and restart their
//! subscriptions whenever the signed-in user changes (see [`on_user`]).

pub mod account;
pub mod app;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod order;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use opticart_core::{Resource, StoreError, UserId};

use crate::backend::AuthSession;
use crate::error::{add_breadcrumb, report};
use crate::navigation::UiEvent;
use crate::repository::LiveStream;

pub use account::{
    AddEditAddressState, AddEditAddressViewModel, AddressBookState, AddressBookViewModel,
    AddressForm, ProfileState, ProfileViewModel, WishlistState, WishlistViewModel,
};
pub use app::{AppViewState, AppViewModel, SplashState, SplashViewModel};
pub use auth::{LoginState, LoginViewModel, RegisterForm, RegisterState, RegisterViewModel};
pub use cart::{CartState, CartViewModel, CheckoutState, CheckoutViewModel};
pub use catalog::{HomeState, HomeViewModel, ProductDetailState, ProductDetailViewModel};
pub use order::{OrderDetailState, OrderDetailViewModel, OrdersState, OrdersViewModel};

/// Capacity of each view model's event channel.
const EVENT_CAPACITY: usize = 16;

/// State snapshot and event channel shared by a view model and its tasks.
pub struct ViewState<S> {
    state: Arc<watch::Sender<S>>,
    events: broadcast::Sender<UiEvent>,
    /// Message of the last failed write, kept on screen until the next write
    /// starts. Only locked inside a state update.
    action_error: Arc<Mutex<Option<String>>>,
}

impl<S> Clone for ViewState<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            action_error: Arc::clone(&self.action_error),
        }
    }
}

impl<S: Clone> ViewState<S> {
    #[must_use]
    pub fn new(initial: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(watch::Sender::new(initial)),
            events,
            action_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> S {
        self.state.borrow().clone()
    }

    /// Subscribe to one-shot events. Only events sent after this call are
    /// received.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    pub(crate) fn update(&self, modify: impl FnOnce(&mut S)) {
        self.state.send_modify(modify);
    }

    fn set_action_error(&self, message: Option<String>) {
        *self
            .action_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }

    fn action_error(&self) -> Option<String> {
        self.action_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn emit(&self, event: UiEvent) {
        match &event {
            UiEvent::Navigate(route) => add_breadcrumb("navigation", &route.path(), None),
            UiEvent::NavigateBack => add_breadcrumb("navigation", "back", None),
            UiEvent::ShowMessage(_) => {}
        }
        // Nobody listening is fine; the host subscribes while the screen is shown.
        let _ = self.events.send(event);
    }
}

/// Accessors every view model shares.
pub trait ViewModel {
    type State: Clone;

    fn view(&self) -> &ViewState<Self::State>;

    /// Subscribe to state snapshots.
    fn state(&self) -> watch::Receiver<Self::State> {
        self.view().subscribe()
    }

    /// The current snapshot.
    fn snapshot(&self) -> Self::State {
        self.view().snapshot()
    }

    /// Subscribe to navigation and toast events.
    fn events(&self) -> broadcast::Receiver<UiEvent> {
        self.view().events()
    }
}

macro_rules! view_model {
    ($vm:ty => $state:ty) => {
        impl $crate::viewmodel::ViewModel for $vm {
            type State = $state;

            fn view(&self) -> &$crate::viewmodel::ViewState<$state> {
                &self.view
            }
        }
    };
}

pub(crate) use view_model;

/// States with the common loading flag and error message.
pub trait Loadable {
    fn error(&self) -> Option<&str>;
    fn set_loading(&mut self, loading: bool);
    fn set_error(&mut self, error: Option<String>);
}

macro_rules! loadable {
    ($($state:ty),+ $(,)?) => {
        $(
            impl $crate::viewmodel::Loadable for $state {
                fn error(&self) -> Option<&str> {
                    self.error.as_deref()
                }

                fn set_loading(&mut self, loading: bool) {
                    self.is_loading = loading;
                }

                fn set_error(&mut self, error: Option<String>) {
                    self.error = error;
                }
            }
        )+
    };
}

pub(crate) use loadable;

/// Fold one emission into a state: `Loading` raises the flag, `Success`
/// applies the value and clears flag and error, `Error` records the message.
///
/// A `Success` leaves `kept` in place: that is the failed write's message,
/// which stays until the next write.
pub(crate) fn fold<S, T>(
    state: &mut S,
    resource: Resource<T>,
    context: &str,
    kept: Option<&str>,
    apply: impl FnOnce(&mut S, T),
) where
    S: Loadable,
{
    match resource {
        Resource::Loading => state.set_loading(true),
        Resource::Success(value) => {
            apply(state, value);
            state.set_loading(false);
            if kept.is_none() || state.error() != kept {
                state.set_error(None);
            }
        }
        Resource::Error(err) => fail(state, &err, context),
    }
}

fn fail<S: Loadable>(state: &mut S, err: &StoreError, context: &str) {
    report(err, context);
    state.set_loading(false);
    state.set_error(Some(err.user_message()));
}

/// Spawn a task folding a live read into the view state.
pub(crate) fn follow<S, T, F>(
    view: &ViewState<S>,
    mut stream: LiveStream<T>,
    context: &'static str,
    apply: F,
) -> JoinHandle<()>
where
    S: Loadable + Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(&mut S, T) + Send + 'static,
{
    let view = view.clone();
    tokio::spawn(async move {
        while let Some(resource) = stream.next().await {
            view.update(|state| {
                let kept = view.action_error();
                fold(state, resource, context, kept.as_deref(), &apply);
            });
        }
    })
}

/// Spawn a detached write.
///
/// Raises the loading flag, clears it when the write resolves, records the
/// error on failure and otherwise hands the value to `on_success`.
pub(crate) fn launch<S, T, Fut, F>(
    view: &ViewState<S>,
    context: &'static str,
    write: Fut,
    on_success: F,
) -> JoinHandle<()>
where
    S: Loadable + Clone + Send + Sync + 'static,
    T: Send + 'static,
    Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    F: FnOnce(&ViewState<S>, T) + Send + 'static,
{
    view.update(|state| {
        state.set_loading(true);
        state.set_error(None);
        view.set_action_error(None);
    });
    let view = view.clone();
    tokio::spawn(async move {
        match write.await {
            Ok(value) => {
                view.update(|state| state.set_loading(false));
                on_success(&view, value);
            }
            Err(err) => fail_action(&view, &err, context),
        }
    })
}

fn fail_action<S: Loadable + Clone>(view: &ViewState<S>, err: &StoreError, context: &str) {
    view.update(|state| {
        fail(state, err, context);
        view.set_action_error(Some(err.user_message()));
    });
}

/// Record a failure that happened before any write was started.
pub(crate) fn reject<S>(view: &ViewState<S>, err: &StoreError, context: &str) -> JoinHandle<()>
where
    S: Loadable + Clone,
{
    fail_action(view, err, context);
    tokio::spawn(async {})
}

/// Follow the signed-in user, restarting the subscriptions `start` opens
/// whenever the user changes.
///
/// Every change first applies `reset`, told whether a user is now signed
/// in; `start` then runs for that user. Tasks started for the previous user
/// are aborted, and so are the current ones when the returned handle is
/// aborted.
pub(crate) fn on_user<S, F, R>(
    view: &ViewState<S>,
    mut users: watch::Receiver<Option<AuthSession>>,
    start: F,
    reset: R,
) -> JoinHandle<()>
where
    S: Clone + Send + Sync + 'static,
    F: Fn(&ViewState<S>, &AuthSession) -> Vec<JoinHandle<()>> + Send + 'static,
    R: Fn(&mut S, bool) + Send + 'static,
{
    let view = view.clone();
    tokio::spawn(async move {
        let mut current: Option<Option<UserId>> = None;
        let mut inner = TaskGroup::new();
        loop {
            let session = users.borrow_and_update().clone();
            let uid = session.as_ref().map(|s| s.uid.clone());
            if current.as_ref() != Some(&uid) {
                inner.abort_all();
                view.update(|state| reset(state, session.is_some()));
                if let Some(session) = &session {
                    inner.extend(start(&view, session));
                }
                current = Some(uid);
            }
            if users.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Clear a user-scoped state. Signing out leaves the `Unauthenticated`
/// message in place of content.
pub(crate) fn reset_for_user<S: Default + Loadable>(state: &mut S, signed_in: bool) {
    *state = S::default();
    if !signed_in {
        state.set_error(Some(StoreError::Unauthenticated.user_message()));
    }
}

/// The signed-in session, or `Unauthenticated`.
pub(crate) fn signed_in(
    users: &watch::Receiver<Option<AuthSession>>,
) -> Result<AuthSession, StoreError> {
    users.borrow().clone().ok_or(StoreError::Unauthenticated)
}

/// Tasks owned by a view model, aborted together on drop.
#[derive(Default)]
pub(crate) struct TaskGroup {
    handles: Vec<JoinHandle<()>>,
}

impl TaskGroup {
    pub(crate) const fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
    }

    pub(crate) fn extend(&mut self, handles: impl IntoIterator<Item = JoinHandle<()>>) {
        for handle in handles {
            self.push(handle);
        }
    }

    pub(crate) fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// A single restartable subscription.
#[derive(Default)]
pub(crate) struct TaskSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskSlot {
    /// Replace the running task, aborting the previous one.
    pub(crate) fn replace(&self, handle: JoinHandle<()>) {
        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Some(handle) = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use secrecy::SecretString;
    use tokio::sync::{broadcast, watch};

    use crate::backend::AuthProvider;
    use crate::backend::memory::{MemoryAuthProvider, MemoryDocumentStore, MemorySettingsStore};
    use crate::navigation::UiEvent;
    use crate::repository::Repositories;
    use crate::usecase::UseCases;

    const TIMEOUT: Duration = Duration::from_secs(5);

    pub(crate) struct Harness {
        pub store: MemoryDocumentStore,
        pub auth: Arc<MemoryAuthProvider>,
        pub use_cases: UseCases,
    }

    pub(crate) fn harness() -> Harness {
        let store = MemoryDocumentStore::new();
        let auth = Arc::new(MemoryAuthProvider::new());
        let repos = Repositories::new(
            Arc::new(store.clone()),
            Arc::clone(&auth) as Arc<dyn AuthProvider>,
            Arc::new(MemorySettingsStore::default()),
        );
        Harness {
            store,
            auth,
            use_cases: UseCases::new(&repos),
        }
    }

    impl Harness {
        pub(crate) async fn sign_up(&self, email: &str) -> crate::backend::AuthSession {
            self.use_cases
                .sign_up
                .execute("Jane Doe", email, &SecretString::from("correct horse"))
                .await
                .unwrap()
        }
    }

    /// Wait until the state satisfies `pred`, returning that snapshot.
    pub(crate) async fn wait_for<S: Clone>(
        rx: &mut watch::Receiver<S>,
        pred: impl FnMut(&S) -> bool,
    ) -> S {
        tokio::time::timeout(TIMEOUT, rx.wait_for(pred))
            .await
            .unwrap()
            .unwrap()
            .clone()
    }

    pub(crate) async fn next_event(rx: &mut broadcast::Receiver<UiEvent>) -> UiEvent {
        tokio::time::timeout(TIMEOUT, rx.recv())
            .await
            .unwrap()
            .unwrap()
    }
}
