//! Password and refresh-token hashing.
//!
//! Both secrets are hashed with Argon2id. Hashing is CPU-bound, so the
//! async entry points run it on the blocking pool.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use cartline_core::Email;

use super::AuthError;
use crate::db::UserRepository;
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Verified against when the email is unknown, so a miss costs the same
/// as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("cartline-dummy-password").ok());

/// Hash a secret using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a secret against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the secret does not match or
/// the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// [`hash_password`] on the blocking pool.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails or the task panics.
pub async fn hash_secret(secret: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&secret))
        .await
        .map_err(|_| AuthError::PasswordHash)?
}

/// [`verify_password`] on the blocking pool.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch and
/// `AuthError::PasswordHash` if the task panics.
pub async fn verify_secret(secret: String, hash: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&secret, &hash))
        .await
        .map_err(|_| AuthError::PasswordHash)?
}

/// Validate a sign-up password.
///
/// # Errors
///
/// Returns `AuthError::Validation` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Checks email/password pairs against stored accounts.
pub struct CredentialVerifier<'a> {
    users: &'a dyn UserRepository,
}

impl<'a> CredentialVerifier<'a> {
    #[must_use]
    pub const fn new(users: &'a dyn UserRepository) -> Self {
        Self { users }
    }

    /// Return the user if the password matches.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or a
    /// wrong password, indistinguishably.
    pub async fn verify(&self, email: &Email, password: &str) -> Result<User, AuthError> {
        let Some(credentials) = self.users.find_credentials(email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_ref() {
                // Result ignored: the point is spending the same time
                let _ = verify_secret(password.to_owned(), dummy.clone()).await;
            }
            return Err(AuthError::InvalidCredentials);
        };

        verify_secret(password.to_owned(), credentials.password_hash).await?;
        Ok(credentials.user)
    }
}
