//! Bearer-token authentication extractor.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::AuthClaims;
use crate::state::AppState;

/// Extractor that requires a valid access token.
///
/// Reads `Authorization: Bearer <token>` and verifies it with the access
/// secret. Missing, malformed and expired tokens are all rejected with the
/// same 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(claims): RequireAuth) -> String {
///     format!("Hello, {}!", claims.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthClaims);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let claims = state
            .tokens()
            .verify_access_token(token)
            .map_err(|_| AppError::Unauthorized)?;

        set_sentry_user(&claims.sub);
        tracing::Span::current().record("user_id", tracing::field::display(claims.sub));

        Ok(Self(claims))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
