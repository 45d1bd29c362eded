//! Login and registration screens.

use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;

use opticart_core::StoreError;

use super::{ViewState, launch, loadable, reject, view_model};
use crate::backend::FederatedCredential;
use crate::navigation::{Route, UiEvent};
use crate::usecase::{SendPasswordReset, SignIn, SignInWithGoogle, SignUp, UseCases};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginState {
    pub is_loading: bool,
    pub error: Option<String>,
    /// A reset link was requested for this address.
    pub reset_sent_to: Option<String>,
}

loadable!(LoginState);

pub struct LoginViewModel {
    view: ViewState<LoginState>,
    sign_in: SignIn,
    sign_in_with_google: SignInWithGoogle,
    send_password_reset: SendPasswordReset,
}

view_model!(LoginViewModel => LoginState);

impl LoginViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        Self {
            view: ViewState::new(LoginState::default()),
            sign_in: use_cases.sign_in.clone(),
            sign_in_with_google: use_cases.sign_in_with_google.clone(),
            send_password_reset: use_cases.send_password_reset.clone(),
        }
    }

    pub fn sign_in(&self, email: &str, password: SecretString) -> JoinHandle<()> {
        if email.trim().is_empty() || password.expose_secret().is_empty() {
            return reject(
                &self.view,
                &StoreError::validation("Enter your email and password"),
                "sign_in",
            );
        }
        let sign_in = self.sign_in.clone();
        let email = email.trim().to_string();
        launch(
            &self.view,
            "sign_in",
            async move { sign_in.execute(&email, &password).await },
            |view, _| view.emit(UiEvent::Navigate(Route::Home)),
        )
    }

    /// Complete a Google sign-in with the credential the host obtained.
    pub fn sign_in_with_google(&self, credential: FederatedCredential) -> JoinHandle<()> {
        let google = self.sign_in_with_google.clone();
        launch(
            &self.view,
            "sign_in_with_google",
            async move { google.execute(&credential).await },
            |view, _| view.emit(UiEvent::Navigate(Route::Home)),
        )
    }

    pub fn send_password_reset(&self, email: &str) -> JoinHandle<()> {
        let reset = self.send_password_reset.clone();
        let email = email.trim().to_string();
        launch(
            &self.view,
            "send_password_reset",
            async move {
                reset.execute(&email).await?;
                Ok(email)
            },
            |view, email| {
                view.update(|s| s.reset_sent_to = Some(email));
                view.emit(UiEvent::ShowMessage(
                    "Check your inbox for a reset link".to_string(),
                ));
            },
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterState {
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(RegisterState);

/// Registration form input.
#[derive(Debug)]
pub struct RegisterForm {
    pub display_name: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

pub struct RegisterViewModel {
    view: ViewState<RegisterState>,
    sign_up: SignUp,
}

view_model!(RegisterViewModel => RegisterState);

impl RegisterViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        Self {
            view: ViewState::new(RegisterState::default()),
            sign_up: use_cases.sign_up.clone(),
        }
    }

    pub fn register(&self, form: RegisterForm) -> JoinHandle<()> {
        if form.password.expose_secret() != form.confirm_password.expose_secret() {
            return reject(
                &self.view,
                &StoreError::validation("Passwords do not match"),
                "register",
            );
        }
        let sign_up = self.sign_up.clone();
        launch(
            &self.view,
            "register",
            async move {
                sign_up
                    .execute(&form.display_name, &form.email, &form.password)
                    .await
            },
            |view, _| view.emit(UiEvent::Navigate(Route::Home)),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::AuthProvider;
    use crate::viewmodel::ViewModel;
    use crate::viewmodel::testing::{harness, next_event};

    fn form(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            display_name: "Jane".into(),
            email: "jane@example.com".into(),
            password: SecretString::from(password),
            confirm_password: SecretString::from(confirm),
        }
    }

    #[tokio::test]
    async fn test_register_then_sign_in_navigates_home() {
        let h = harness();
        let register = RegisterViewModel::new(&h.use_cases);
        let mut events = register.events();
        register
            .register(form("correct horse", "correct horse"))
            .await
            .unwrap();
        assert_eq!(next_event(&mut events).await, UiEvent::Navigate(Route::Home));
        h.use_cases.sign_out.execute().await.unwrap();

        let login = LoginViewModel::new(&h.use_cases);
        let mut events = login.events();
        login
            .sign_in("jane@example.com", SecretString::from("correct horse"))
            .await
            .unwrap();
        assert_eq!(next_event(&mut events).await, UiEvent::Navigate(Route::Home));
        assert_eq!(login.snapshot(), LoginState::default());
    }

    #[tokio::test]
    async fn test_mismatched_passwords_rejected_locally() {
        let h = harness();
        let register = RegisterViewModel::new(&h.use_cases);
        register
            .register(form("correct horse", "battery staple"))
            .await
            .unwrap();
        assert_eq!(
            register.snapshot().error.as_deref(),
            Some("Passwords do not match")
        );
        assert!(h.auth.current_user().borrow().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_shows_error() {
        let h = harness();
        h.sign_up("jane@example.com").await;
        let login = LoginViewModel::new(&h.use_cases);
        login
            .sign_in("jane@example.com", SecretString::from("wrong password"))
            .await
            .unwrap();
        let state = login.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some("Invalid email or password"));
    }

    #[tokio::test]
    async fn test_password_reset_records_address() {
        let h = harness();
        let login = LoginViewModel::new(&h.use_cases);
        login.send_password_reset(" jane@example.com ").await.unwrap();
        assert_eq!(
            login.snapshot().reset_sent_to.as_deref(),
            Some("jane@example.com")
        );
    }
}
