//! `PostgreSQL` accounts with argon2 password hashes.
//!
//! # Tables
//!
//! - `opticart.account` - one row per sign-in identity
//! - `opticart.password_reset` - outstanding reset tokens
//!
//! The signed-in user is held in process; restarting signs the user out.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{info, instrument};
use uuid::Uuid;

use opticart_core::{Email, UserId};

use super::auth::validate_new_password;
use super::postgres::map_sqlx_error;
use super::{AuthError, AuthProvider, AuthSession, FederatedCredential, SignInProvider};

/// How long a password reset token stays valid.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(sqlx::FromRow)]
struct AccountRow {
    uid: String,
    email: String,
    password_hash: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl AccountRow {
    fn session(self, provider: SignInProvider, is_new_user: bool) -> Result<AuthSession, AuthError> {
        Ok(AuthSession {
            uid: UserId::new(self.uid),
            email: Email::parse(&self.email)?,
            display_name: self.display_name,
            photo_url: self.photo_url,
            provider,
            is_new_user,
        })
    }
}

fn backend_error(err: sqlx::Error) -> AuthError {
    match map_sqlx_error(err) {
        opticart_core::StoreError::Network(msg) => AuthError::Network(msg),
        other => AuthError::Backend(other.to_string()),
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &SecretString) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &SecretString, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Run argon2 off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Backend(format!("hashing task failed: {e}")))?
}

/// Auth provider backed by `opticart.account`.
pub struct PgAuthProvider {
    pool: PgPool,
    current: watch::Sender<Option<AuthSession>>,
}

impl PgAuthProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (current, _) = watch::channel(None);
        Self { pool, current }
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<AccountRow>, AuthError> {
        sqlx::query_as::<_, AccountRow>(
            r"
            SELECT uid, email, password_hash, display_name, photo_url
            FROM opticart.account
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)
    }

    fn publish(&self, session: &AuthSession) {
        self.current.send_replace(Some(session.clone()));
    }
}

#[async_trait]
impl AuthProvider for PgAuthProvider {
    fn current_user(&self) -> watch::Receiver<Option<AuthSession>> {
        self.current.subscribe()
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = account
            .password_hash
            .clone()
            .ok_or(AuthError::InvalidCredentials)?;

        let password = password.clone();
        blocking(move || verify_password(&password, &hash)).await?;

        let session = account.session(SignInProvider::Password, false)?;
        self.publish(&session);
        info!(uid = %session.uid, "Signed in");
        Ok(session)
    }

    #[instrument(skip(self, password, display_name), fields(email = %email))]
    async fn sign_up_with_password(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: &str,
    ) -> Result<AuthSession, AuthError> {
        validate_new_password(password)?;
        let password = password.clone();
        let hash = blocking(move || hash_password(&password)).await?;

        let uid = UserId::generate();
        let account = sqlx::query_as::<_, AccountRow>(
            r"
            INSERT INTO opticart.account (uid, email, password_hash, display_name)
            VALUES ($1, $2, $3, $4)
            RETURNING uid, email, password_hash, display_name, photo_url
            ",
        )
        .bind(uid.as_str())
        .bind(email.as_str())
        .bind(&hash)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::UserAlreadyExists,
            other => backend_error(other),
        })?;

        let session = account.session(SignInProvider::Password, true)?;
        self.publish(&session);
        info!(uid = %session.uid, "Account created");
        Ok(session)
    }

    #[instrument(skip(self, credential), fields(provider = credential.provider.label()))]
    async fn sign_in_with_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthSession, AuthError> {
        if credential.provider != SignInProvider::Google {
            return Err(AuthError::UnsupportedProvider(credential.provider.label()));
        }

        let existing = sqlx::query_as::<_, AccountRow>(
            r"
            SELECT uid, email, password_hash, display_name, photo_url
            FROM opticart.account
            WHERE google_subject = $1 OR email = $2
            ORDER BY (google_subject = $1) DESC NULLS LAST
            LIMIT 1
            ",
        )
        .bind(&credential.subject)
        .bind(credential.email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        let session = if let Some(account) = existing {
            sqlx::query("UPDATE opticart.account SET google_subject = $1 WHERE uid = $2")
                .bind(&credential.subject)
                .bind(&account.uid)
                .execute(&self.pool)
                .await
                .map_err(backend_error)?;
            account.session(SignInProvider::Google, false)?
        } else {
            let account = sqlx::query_as::<_, AccountRow>(
                r"
                INSERT INTO opticart.account (uid, email, google_subject, display_name, photo_url)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING uid, email, password_hash, display_name, photo_url
                ",
            )
            .bind(UserId::generate().as_str())
            .bind(credential.email.as_str())
            .bind(&credential.subject)
            .bind(credential.display_name.as_deref())
            .bind(credential.photo_url.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;
            account.session(SignInProvider::Google, true)?
        };

        self.publish(&session);
        info!(uid = %session.uid, new = session.is_new_user, "Signed in with Google");
        Ok(session)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthError> {
        let Some(account) = self.find_by_email(email).await? else {
            // Don't reveal whether the address is registered.
            return Ok(());
        };

        let token = Uuid::new_v4();
        sqlx::query(
            r"
            INSERT INTO opticart.password_reset (token, uid, expires_at)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(token)
        .bind(&account.uid)
        .bind(Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS))
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        info!(uid = %account.uid, "Password reset requested");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.current.send_replace(None);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = SecretString::from("correct horse battery");
        let hash = hash_password(&password).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&password, &hash).is_ok());
        assert!(matches!(
            verify_password(&SecretString::from("wrong"), &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password(&SecretString::from("x"), "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
