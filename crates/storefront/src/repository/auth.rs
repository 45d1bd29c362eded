//! Sign-in, sign-up and the current user.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use opticart_core::{Email, StoreError};

use super::user::UserRepository;
use crate::backend::{AuthProvider, AuthSession, DocumentStore, FederatedCredential};
use crate::error::{clear_sentry_user, set_sentry_user};

#[derive(Clone)]
pub struct AuthRepository {
    provider: Arc<dyn AuthProvider>,
    users: UserRepository,
}

impl AuthRepository {
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            provider,
            users: UserRepository::new(store),
        }
    }

    /// Subscribe to the current user.
    #[must_use]
    pub fn current_user(&self) -> watch::Receiver<Option<AuthSession>> {
        self.provider.current_user()
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email or wrong credentials, or the
    /// backend failure.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<AuthSession, StoreError> {
        let email = parse_email(email)?;
        let session = self
            .provider
            .sign_in_with_password(&email, password)
            .await?;
        self.complete(session).await
    }

    /// Create an account and its profile, leaving the user signed in.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `Conflict` for a taken email, or the
    /// backend failure.
    #[instrument(skip(self, password, display_name))]
    pub async fn sign_up(
        &self,
        display_name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, StoreError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(StoreError::validation("Name is required"));
        }
        let email = parse_email(email)?;
        let session = self
            .provider
            .sign_up_with_password(&email, password, display_name)
            .await?;
        let session = self.complete(session).await?;
        info!(user = %session.uid, "Registered");
        Ok(session)
    }

    /// Sign in with a federated credential, creating the profile on first
    /// sign-in.
    ///
    /// # Errors
    ///
    /// Returns the provider or backend failure.
    #[instrument(skip(self, credential))]
    pub async fn sign_in_with_google(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthSession, StoreError> {
        let session = self.provider.sign_in_with_federated(credential).await?;
        self.complete(session).await
    }

    /// Make sure the profile document exists. A session whose profile
    /// cannot be written is signed out again so no screen loads for it.
    async fn complete(&self, session: AuthSession) -> Result<AuthSession, StoreError> {
        if let Err(err) = self.users.ensure_profile(&session).await {
            if let Err(sign_out) = self.provider.sign_out().await {
                warn!(error = %sign_out, "Failed to sign out after profile write failed");
            }
            return Err(err);
        }
        on_signed_in(&session);
        Ok(session)
    }

    /// Ask the provider to email a password reset link.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email, or the backend failure.
    #[instrument(skip(self))]
    pub async fn send_password_reset(&self, email: &str) -> Result<(), StoreError> {
        let email = parse_email(email)?;
        self.provider.send_password_reset(&email).await?;
        Ok(())
    }

    /// Sign out.
    ///
    /// # Errors
    ///
    /// Returns the provider failure.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), StoreError> {
        self.provider.sign_out().await?;
        clear_sentry_user();
        Ok(())
    }
}

fn parse_email(email: &str) -> Result<Email, StoreError> {
    Email::parse(email).map_err(|_| StoreError::validation("Enter a valid email address"))
}

fn on_signed_in(session: &AuthSession) {
    set_sentry_user(&session.uid, Some(session.email.as_str()));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::StreamExt;
    use opticart_core::UserId;

    use super::*;
    use crate::backend::SignInProvider;
    use crate::backend::memory::{MemoryAuthProvider, MemoryDocumentStore};

    fn repo() -> (AuthRepository, UserRepository) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        (
            AuthRepository::new(Arc::new(MemoryAuthProvider::new()), Arc::clone(&store)),
            UserRepository::new(store),
        )
    }

    fn password() -> SecretString {
        SecretString::from("correct horse")
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile() {
        let (auth, users) = repo();
        let session = auth
            .sign_up("Jane Doe", "jane@example.com", &password())
            .await
            .unwrap();
        let mut profile = users.profile(&session.uid);
        profile.next().await.unwrap();
        let user = profile.next().await.unwrap().into_data().unwrap();
        assert_eq!(user.display_name, "Jane Doe");
        assert_eq!(*auth.current_user().borrow(), Some(session));
    }

    #[tokio::test]
    async fn test_bad_input_is_validation() {
        let (auth, _) = repo();
        assert!(matches!(
            auth.sign_up("Jane", "not-an-email", &password()).await.unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            auth.sign_up("  ", "jane@example.com", &password()).await.unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            auth.sign_up("Jane", "jane@example.com", &SecretString::from("short"))
                .await
                .unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            auth.sign_in("jane@example.com", &password()).await.unwrap_err(),
            StoreError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (auth, _) = repo();
        auth.sign_up("Jane", "jane@example.com", &password())
            .await
            .unwrap();
        assert!(matches!(
            auth.sign_up("Jane", "jane@example.com", &password())
                .await
                .unwrap_err(),
            StoreError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_current_user_follows_sign_in_and_out() {
        let (auth, _) = repo();
        let mut current = auth.current_user();
        assert_eq!(*current.borrow_and_update(), None);

        let session = auth
            .sign_up("Jane", "jane@example.com", &password())
            .await
            .unwrap();
        assert!(current.has_changed().unwrap());
        assert_eq!(*current.borrow_and_update(), Some(session));

        auth.sign_out().await.unwrap();
        assert_eq!(*current.borrow_and_update(), None);
    }

    #[tokio::test]
    async fn test_failed_profile_write_signs_out() {
        let store = MemoryDocumentStore::new();
        let auth = AuthRepository::new(
            Arc::new(MemoryAuthProvider::new()),
            Arc::new(store.clone()),
        );
        store.fail_with(StoreError::Network("offline".into())).await;

        let err = auth
            .sign_up("Jane", "jane@example.com", &password())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Network(_)));
        assert_eq!(*auth.current_user().borrow(), None);

        // The account exists; signing in later writes the missing profile.
        store.clear_failure().await;
        let session = auth.sign_in("jane@example.com", &password()).await.unwrap();
        let users = UserRepository::new(Arc::new(store));
        let mut profile = users.profile(&session.uid);
        profile.next().await.unwrap();
        assert_eq!(
            profile.next().await.unwrap().into_data().unwrap().display_name,
            "Jane"
        );
    }

    #[tokio::test]
    async fn test_google_sign_in_creates_profile_once() {
        let (auth, users) = repo();
        let credential = FederatedCredential {
            provider: SignInProvider::Google,
            subject: "g-1".into(),
            email: Email::parse("g@example.com").unwrap(),
            display_name: Some("Gee".into()),
            photo_url: None,
            id_token: SecretString::from("token"),
        };
        let first = auth.sign_in_with_google(&credential).await.unwrap();
        assert!(first.is_new_user);
        auth.sign_out().await.unwrap();
        let second = auth.sign_in_with_google(&credential).await.unwrap();
        assert_eq!(first.uid, second.uid);

        let mut profile = users.profile(&UserId::new(first.uid.as_str()));
        profile.next().await.unwrap();
        assert_eq!(
            profile.next().await.unwrap().into_data().unwrap().display_name,
            "Gee"
        );
    }

    #[tokio::test]
    async fn test_password_reset_validates_email() {
        let (auth, _) = repo();
        assert!(auth.send_password_reset("nope").await.is_err());
        assert!(auth.send_password_reset("jane@example.com").await.is_ok());
    }
}
