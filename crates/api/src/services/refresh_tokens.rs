//! Refresh-token persistence by user.
//!
//! Only an Argon2 hash of the token is stored. Each user has at most one
//! active token: rotation overwrites it in place, so the previous token
//! stops verifying the moment the new one is stored.

use cartline_core::UserId;

use crate::db::{RefreshTokenRepository, RepositoryError};
use crate::models::RefreshTokenRecord;
use crate::services::auth::{AuthError, credentials};

/// Hashes and stores refresh tokens.
pub struct RefreshTokenStore<'a> {
    repo: &'a dyn RefreshTokenRepository,
}

impl<'a> RefreshTokenStore<'a> {
    #[must_use]
    pub const fn new(repo: &'a dyn RefreshTokenRepository) -> Self {
        Self { repo }
    }

    /// Store the first token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RefreshTokenExists` if the user already has one.
    pub async fn create(&self, user_id: UserId, token: &str) -> Result<(), AuthError> {
        let hash = credentials::hash_secret(token.to_owned()).await?;
        self.repo
            .insert(user_id, &hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::RefreshTokenExists,
                other => AuthError::Repository(other),
            })?;
        Ok(())
    }

    /// The stored record, if any.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn find_by_user_id(
        &self,
        user_id: UserId,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.repo.find_by_user_id(user_id).await?)
    }

    /// Replace the stored hash with one for `new_token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RefreshTokenNotFound` if the user has no token.
    pub async fn rotate(&self, user_id: UserId, new_token: &str) -> Result<(), AuthError> {
        let hash = credentials::hash_secret(new_token.to_owned()).await?;
        self.repo
            .replace(user_id, &hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::RefreshTokenNotFound,
                other => AuthError::Repository(other),
            })?;
        Ok(())
    }

    /// Store `token` whether or not the user already has one.
    ///
    /// Rotates when a record already exists, otherwise inserts. An insert
    /// that loses a race with a concurrent sign-in hits the primary key and
    /// falls back to rotation, so both end with exactly one stored row.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if storage fails.
    pub async fn create_or_rotate(&self, user_id: UserId, token: &str) -> Result<(), AuthError> {
        if self.find_by_user_id(user_id).await?.is_some() {
            return self.rotate(user_id, token).await;
        }

        match self.create(user_id, token).await {
            Err(AuthError::RefreshTokenExists) => self.rotate(user_id, token).await,
            other => other,
        }
    }

    /// Delete the user's token. Revoking twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the delete fails.
    pub async fn revoke(&self, user_id: UserId) -> Result<bool, AuthError> {
        Ok(self.repo.delete(user_id).await?)
    }

    /// Check a presented token against the stored hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRefreshToken` if no token is stored or the
    /// presented one does not match it.
    pub async fn verify(&self, user_id: UserId, presented: &str) -> Result<(), AuthError> {
        let record = self
            .repo
            .find_by_user_id(user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        credentials::verify_secret(presented.to_owned(), record.token_hash)
            .await
            .map_err(|e| match e {
                AuthError::InvalidCredentials => AuthError::InvalidRefreshToken,
                other => other,
            })
    }
}
