//! Token claims and the session lifecycle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cartline_core::{Email, UserId, UserRole};

/// Identity embedded into freshly issued tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    pub sub: UserId,
    pub email: Email,
    pub role: Option<UserRole>,
}

/// Decoded JWT claims.
///
/// `jti` is a random per-token ID: two tokens issued for the same user in
/// the same second still differ, so a rotated refresh token can never hash
/// to the same value as its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: UserId,
    pub email: Email,
    pub jti: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    pub iat: i64,
    pub exp: i64,
}

impl AuthClaims {
    /// Identity carried by these claims, for re-issuing tokens.
    #[must_use]
    pub fn payload(&self) -> AuthPayload {
        AuthPayload {
            sub: self.sub,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Per-client session state.
///
/// `Anonymous -> Authenticated` on sign-up or sign-in,
/// `Authenticated -> Revoked` on sign-out. Revoked is terminal for that
/// session: the stored refresh token is gone and the client is back to
/// anonymous once its access token lapses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(AuthClaims),
    Revoked(UserId),
}

impl SessionState {
    /// Claims of an authenticated session.
    #[must_use]
    pub const fn claims(&self) -> Option<&AuthClaims> {
        match self {
            Self::Authenticated(claims) => Some(claims),
            Self::Anonymous | Self::Revoked(_) => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Sign the session out. Only an authenticated session can be revoked.
    #[must_use]
    pub fn revoke(self) -> Self {
        match self {
            Self::Authenticated(claims) => Self::Revoked(claims.sub),
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn claims() -> AuthClaims {
        AuthClaims {
            sub: UserId::generate(),
            email: Email::parse("ada@example.com").unwrap(),
            jti: Uuid::new_v4(),
            role: None,
            iat: 0,
            exp: 900,
        }
    }

    #[test]
    fn test_default_is_anonymous() {
        assert_eq!(SessionState::default(), SessionState::Anonymous);
        assert!(SessionState::default().claims().is_none());
    }

    #[test]
    fn test_revoke_authenticated() {
        let claims = claims();
        let user_id = claims.sub;
        let state = SessionState::Authenticated(claims);
        assert!(state.is_authenticated());
        assert_eq!(state.revoke(), SessionState::Revoked(user_id));
    }

    #[test]
    fn test_revoke_anonymous_is_noop() {
        assert_eq!(SessionState::Anonymous.revoke(), SessionState::Anonymous);
    }

    #[test]
    fn test_claims_omit_missing_role() {
        let json = serde_json::to_value(claims()).unwrap();
        assert!(json.get("role").is_none());
        assert!(json.get("jti").is_some());
    }
}
