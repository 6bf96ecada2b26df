//! JWT issuing and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with two different
//! secrets, so a token of one kind never verifies as the other.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{AuthClaims, AuthPayload};

/// Access token lifetime (15 minutes).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime (7 days).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Clock skew tolerated when checking `exp`.
const LEEWAY_SECS: u64 = 5;

/// Errors from token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signing failed.
    #[error("token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    /// Signature, shape or expiry check failed.
    #[error("invalid token")]
    Invalid,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl SigningKeys {
    fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    fn issue(&self, payload: &AuthPayload, now: i64) -> Result<String, TokenError> {
        let claims = AuthClaims {
            sub: payload.sub,
            email: payload.email.clone(),
            jti: Uuid::new_v4(),
            role: payload.role,
            iat: now,
            exp: now + self.ttl_secs,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Encode)
    }

    fn verify(&self, token: &str) -> Result<AuthClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;

        jsonwebtoken::decode::<AuthClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token verification failed");
                TokenError::Invalid
            })
    }
}

/// Issues and verifies access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: SigningKeys::new(
                config.access_token_secret.expose_secret().as_bytes(),
                ACCESS_TOKEN_TTL_SECS,
            ),
            refresh: SigningKeys::new(
                config.refresh_token_secret.expose_secret().as_bytes(),
                REFRESH_TOKEN_TTL_SECS,
            ),
        }
    }

    /// Issue a 15-minute access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_access_token(&self, payload: &AuthPayload) -> Result<String, TokenError> {
        self.access.issue(payload, Utc::now().timestamp())
    }

    /// Issue a 7-day refresh token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue_refresh_token(&self, payload: &AuthPayload) -> Result<String, TokenError> {
        self.refresh.issue(payload, Utc::now().timestamp())
    }

    /// Verify an access token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for a bad signature, malformed token or
    /// expired token.
    pub fn verify_access_token(&self, token: &str) -> Result<AuthClaims, TokenError> {
        self.access.verify(token)
    }

    /// Verify a refresh token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for a bad signature, malformed token or
    /// expired token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<AuthClaims, TokenError> {
        self.refresh.verify(token)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl_secs", &self.access.ttl_secs)
            .field("refresh_ttl_secs", &self.refresh.ttl_secs)
            .finish_non_exhaustive()
    }
}
