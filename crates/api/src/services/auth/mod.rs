//! Session lifecycle: sign-up, sign-in, refresh and sign-out.
//!
//! A session is an access/refresh token pair. The refresh token's hash is
//! stored per user, and each sign-in rotates it, so only the most recent
//! sign-in can refresh.

pub mod credentials;
mod error;

pub use credentials::CredentialVerifier;
pub use error::AuthError;

use cartline_core::{Email, UserRole};

use crate::db::{RefreshTokenRepository, RepositoryError, UserRepository};
use crate::models::{AuthClaims, AuthPayload, NewUser, SessionState, User};
use crate::services::refresh_tokens::RefreshTokenStore;
use crate::services::tokens::TokenIssuer;

/// Sign-up input as received from the client.
#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Sign-in input as received from the client.
#[derive(Debug, Clone)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// A new authenticated session.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub access_token: String,
    /// Delivered only as an http-only cookie.
    pub refresh_token: String,
    pub user: User,
    pub state: SessionState,
}

/// A fresh access token from a refresh.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: String,
    pub claims: AuthClaims,
}

/// Session operations over the user and refresh-token repositories.
pub struct SessionService<'a> {
    users: &'a dyn UserRepository,
    refresh_tokens: RefreshTokenStore<'a>,
    tokens: &'a TokenIssuer,
}

impl<'a> SessionService<'a> {
    #[must_use]
    pub const fn new(
        users: &'a dyn UserRepository,
        refresh_tokens: &'a dyn RefreshTokenRepository,
        tokens: &'a TokenIssuer,
    ) -> Self {
        Self {
            users,
            refresh_tokens: RefreshTokenStore::new(refresh_tokens),
            tokens,
        }
    }

    /// Register an account and start its first session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::Validation` for bad
    /// input and `AuthError::EmailInUse` if the email is registered.
    #[tracing::instrument(skip_all)]
    pub async fn sign_up(&self, input: SignUpInput) -> Result<SessionGrant, AuthError> {
        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(AuthError::Validation("name cannot be empty".to_owned()));
        }
        let email = Email::parse(&input.email)?;
        credentials::validate_password(&input.password)?;

        let password_hash = credentials::hash_secret(input.password).await?;

        let user = self
            .users
            .create(&NewUser {
                name,
                email,
                password_hash,
                role: UserRole::Customer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailInUse,
                other => AuthError::Repository(other),
            })?;

        // The account is already committed. If issuing the session fails the
        // email stays taken, and a later sign-in stores the refresh record
        // through create_or_rotate.
        let grant = self.grant(user)?;
        self.refresh_tokens
            .create(grant.user.id, &grant.refresh_token)
            .await?;

        tracing::info!(user_id = %grant.user.id, "User signed up");
        Ok(grant)
    }

    /// Verify credentials and start a session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or
    /// wrong password.
    #[tracing::instrument(skip_all)]
    pub async fn sign_in(&self, input: SignInInput) -> Result<SessionGrant, AuthError> {
        // A malformed email cannot match an account; fail the same way
        let email = Email::parse(&input.email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = CredentialVerifier::new(self.users)
            .verify(&email, &input.password)
            .await?;

        let grant = self.grant(user)?;
        self.refresh_tokens
            .create_or_rotate(grant.user.id, &grant.refresh_token)
            .await?;

        tracing::info!(user_id = %grant.user.id, "User signed in");
        Ok(grant)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRefreshToken` if the token is invalid,
    /// expired, revoked or superseded by a later sign-in.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, presented: &str) -> Result<AccessGrant, AuthError> {
        let claims = self
            .tokens
            .verify_refresh_token(presented)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        self.refresh_tokens.verify(claims.sub, presented).await?;

        let access_token = self.tokens.issue_access_token(&claims.payload())?;
        let claims = self.tokens.verify_access_token(&access_token)?;

        Ok(AccessGrant {
            access_token,
            claims,
        })
    }

    /// End the session by deleting the user's refresh token.
    ///
    /// Outstanding access tokens stay valid until they expire.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the delete fails.
    #[tracing::instrument(skip_all, fields(user_id = %claims.sub))]
    pub async fn sign_out(&self, claims: &AuthClaims) -> Result<SessionState, AuthError> {
        let existed = self.refresh_tokens.revoke(claims.sub).await?;
        tracing::info!(user_id = %claims.sub, had_token = existed, "User signed out");

        Ok(SessionState::Authenticated(claims.clone()).revoke())
    }

    fn grant(&self, user: User) -> Result<SessionGrant, AuthError> {
        let payload = AuthPayload {
            sub: user.id,
            email: user.email.clone(),
            role: Some(user.role),
        };

        let access_token = self.tokens.issue_access_token(&payload)?;
        let refresh_token = self.tokens.issue_refresh_token(&payload)?;
        let claims = self.tokens.verify_access_token(&access_token)?;

        Ok(SessionGrant {
            access_token,
            refresh_token,
            user,
            state: SessionState::Authenticated(claims),
        })
    }
}
