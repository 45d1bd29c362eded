//! Authentication actions.

use secrecy::SecretString;
use tokio::sync::watch;

use opticart_core::StoreError;

use super::use_case;
use crate::backend::{AuthSession, FederatedCredential};
use crate::repository::AuthRepository;

use_case!(
    /// Subscribe to the signed-in user.
    ObserveCurrentUser => AuthRepository
);

impl ObserveCurrentUser {
    #[must_use]
    pub fn execute(&self) -> watch::Receiver<Option<AuthSession>> {
        self.repo.current_user()
    }
}

use_case!(
    /// Sign in with email and password.
    SignIn => AuthRepository
);

impl SignIn {
    /// # Errors
    ///
    /// See [`AuthRepository::sign_in`].
    pub async fn execute(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, StoreError> {
        self.repo.sign_in(email, password).await
    }
}

use_case!(
    /// Register a password account.
    SignUp => AuthRepository
);

impl SignUp {
    /// # Errors
    ///
    /// See [`AuthRepository::sign_up`].
    pub async fn execute(
        &self,
        display_name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, StoreError> {
        self.repo.sign_up(display_name, email, password).await
    }
}

use_case!(
    /// Sign in with a Google credential.
    SignInWithGoogle => AuthRepository
);

impl SignInWithGoogle {
    /// # Errors
    ///
    /// See [`AuthRepository::sign_in_with_google`].
    pub async fn execute(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthSession, StoreError> {
        self.repo.sign_in_with_google(credential).await
    }
}

use_case!(
    /// Request a password reset email.
    SendPasswordReset => AuthRepository
);

impl SendPasswordReset {
    /// # Errors
    ///
    /// See [`AuthRepository::send_password_reset`].
    pub async fn execute(&self, email: &str) -> Result<(), StoreError> {
        self.repo.send_password_reset(email).await
    }
}

use_case!(SignOut => AuthRepository);

impl SignOut {
    /// # Errors
    ///
    /// See [`AuthRepository::sign_out`].
    pub async fn execute(&self) -> Result<(), StoreError> {
        self.repo.sign_out().await
    }
}
