//! Authentication error types.

use thiserror::Error;

use cartline_core::EmailError;

use crate::db::RepositoryError;
use crate::services::tokens::TokenError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Sign-up input failed validation.
    #[error("{0}")]
    Validation(String),

    /// Wrong email or password. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email already registered.
    #[error("email already in use")]
    EmailInUse,

    /// A refresh token already exists for this user.
    #[error("refresh token already exists")]
    RefreshTokenExists,

    /// No refresh token is stored for this user.
    #[error("refresh token not found")]
    RefreshTokenNotFound,

    /// Presented refresh token is invalid, expired, revoked or rotated out.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Token signing error.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
