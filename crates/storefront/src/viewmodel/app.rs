//! App shell and splash screen.

use futures::StreamExt;

use super::{TaskGroup, ViewState, view_model};
use crate::navigation::{Route, UiEvent};
use crate::usecase::UseCases;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewState {
    pub dark_theme: bool,
    pub start: Route,
}

impl Default for AppViewState {
    fn default() -> Self {
        Self {
            dark_theme: false,
            start: Route::START,
        }
    }
}

/// Process-wide presentation state: the theme and the first screen.
pub struct AppViewModel {
    view: ViewState<AppViewState>,
    _tasks: TaskGroup,
}

view_model!(AppViewModel => AppViewState);

impl AppViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(AppViewState::default());
        let mut theme = use_cases.observe_dark_theme.execute();
        let theme_view = view.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(tokio::spawn(async move {
            while let Some(dark) = theme.next().await {
                theme_view.update(|s| s.dark_theme = dark);
            }
        }));
        Self {
            view,
            _tasks: tasks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplashState {
    /// Where the splash screen sends the user once auth has resolved.
    pub destination: Option<Route>,
}

pub struct SplashViewModel {
    view: ViewState<SplashState>,
    _tasks: TaskGroup,
}

view_model!(SplashViewModel => SplashState);

impl SplashViewModel {
    /// Decide between home and login from the current session.
    ///
    /// The decision is recorded in the state and sent once as a navigation
    /// event.
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(SplashState::default());
        let signed_in = use_cases.observe_current_user.execute().borrow().is_some();
        let destination = if signed_in { Route::Home } else { Route::Login };
        view.update(|s| s.destination = Some(destination.clone()));

        let events = view.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(tokio::spawn(async move {
            tokio::task::yield_now().await;
            events.emit(UiEvent::Navigate(destination));
        }));
        Self {
            view,
            _tasks: tasks,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::viewmodel::ViewModel;
    use crate::viewmodel::testing::{harness, wait_for};

    #[tokio::test]
    async fn test_splash_destination_follows_session() {
        let h = harness();
        let splash = SplashViewModel::new(&h.use_cases);
        assert_eq!(splash.snapshot().destination, Some(Route::Login));

        h.sign_up("jane@example.com").await;
        let splash = SplashViewModel::new(&h.use_cases);
        assert_eq!(splash.snapshot().destination, Some(Route::Home));
    }

    #[tokio::test]
    async fn test_app_follows_theme() {
        let h = harness();
        let app = AppViewModel::new(&h.use_cases);
        assert_eq!(app.snapshot().start, Route::Splash);
        let mut state = app.state();
        h.use_cases.set_dark_theme.execute(true).await.unwrap();
        wait_for(&mut state, |s| s.dark_theme).await;
    }
}
