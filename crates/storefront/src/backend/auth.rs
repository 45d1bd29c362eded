//! Authentication contract.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::watch;

use opticart_core::{Email, EmailError, StoreError, UserId};

/// Minimum password length for new accounts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length; argon2 input is bounded to keep hashing cheap.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// How a session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInProvider {
    Password,
    Google,
}

impl SignInProvider {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Password => "email",
            Self::Google => "Google",
        }
    }
}

/// The signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub uid: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider: SignInProvider,
    /// True only for the sign-in that created the account.
    pub is_new_user: bool,
}

/// An identity token obtained from an external identity provider.
///
/// The UI layer runs the provider's consent flow and hands the verified
/// result to [`AuthProvider::sign_in_with_federated`].
#[derive(Clone)]
pub struct FederatedCredential {
    pub provider: SignInProvider,
    /// Stable subject identifier at the provider.
    pub subject: String,
    pub email: Email,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub id_token: SecretString,
}

impl std::fmt::Debug for FederatedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedCredential")
            .field("provider", &self.provider)
            .field("subject", &self.subject)
            .field("email", &self.email)
            .field("id_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    UserAlreadyExists,

    #[error("{0}")]
    WeakPassword(String),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("unsupported identity provider: {0}")]
    UnsupportedProvider(&'static str),

    #[error("password hashing failed")]
    PasswordHash,

    #[error("network error: {0}")]
    Network(String),

    #[error("auth backend error: {0}")]
    Backend(String),
}

impl From<AuthError> for StoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::validation("Invalid email or password"),
            AuthError::UserAlreadyExists => {
                Self::Conflict("An account with this email already exists".to_string())
            }
            AuthError::WeakPassword(msg) => Self::Validation(msg),
            AuthError::InvalidEmail(_) => Self::validation("Enter a valid email address"),
            AuthError::Network(msg) => Self::Network(msg),
            AuthError::UnsupportedProvider(_) | AuthError::PasswordHash | AuthError::Backend(_) => {
                Self::Backend(err.to_string())
            }
        }
    }
}

/// Check a new password against the length policy.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the violated rule.
pub fn validate_new_password(password: &SecretString) -> Result<(), AuthError> {
    let len = password.expose_secret().chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Identity provider.
///
/// The current user is process-wide: every subscriber of
/// [`current_user`](Self::current_user) observes the same value, and sign-in
/// or sign-out updates all of them.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Subscribe to the current user.
    fn current_user(&self) -> watch::Receiver<Option<AuthSession>>;

    /// Sign in with email and password.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError>;

    /// Create a password account and sign it in.
    async fn sign_up_with_password(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: &str,
    ) -> Result<AuthSession, AuthError>;

    /// Sign in with a verified external credential, creating the account on
    /// first use.
    async fn sign_in_with_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthSession, AuthError>;

    /// Request a password reset email. Unknown addresses succeed silently.
    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthError>;

    /// Clear the current user.
    async fn sign_out(&self) -> Result<(), AuthError>;
}
