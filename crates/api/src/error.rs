//! Unified error handling with Sentry integration.
//!
//! Handlers return `Result<T, AppError>`. Every error maps onto a small
//! taxonomy (validation, bad request, unauthorized, conflict, not found,
//! internal) and renders as `{"error": "<message>"}`. Internal errors are
//! captured to Sentry and never leak details to the client.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;

/// Generic message for anything the client cannot act on.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Message for every authentication failure, whatever the cause.
const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Request input is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Caller is not authenticated.
    #[error("Unauthorized")]
    Unauthorized,

    /// Request conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    /// Status code and client-safe message.
    fn classify(&self) -> (StatusCode, String) {
        let internal = || (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string());
        let unauthorized = || (StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE.to_string());

        match self {
            Self::Validation(msg) | Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized => unauthorized(),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Internal(_) => internal(),
            Self::Database(err) => match err {
                RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
                RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                RepositoryError::InsufficientStock(_) => (
                    StatusCode::BAD_REQUEST,
                    "Insufficient product quantity".to_string(),
                ),
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => internal(),
            },
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => {
                    (StatusCode::BAD_REQUEST, "Invalid email address".to_string())
                }
                AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid email or password".to_string(),
                ),
                AuthError::InvalidRefreshToken => unauthorized(),
                AuthError::EmailInUse => (StatusCode::CONFLICT, "Email in use".to_string()),
                AuthError::RefreshTokenExists => (
                    StatusCode::CONFLICT,
                    "Refresh token already exists".to_string(),
                ),
                AuthError::RefreshTokenNotFound => (
                    StatusCode::NOT_FOUND,
                    "Refresh token not found".to_string(),
                ),
                AuthError::Token(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
                    internal()
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "Cart is empty".to_string()),
                CheckoutError::InvalidResult => (
                    StatusCode::BAD_REQUEST,
                    "Invalid checkout result".to_string(),
                ),
                CheckoutError::Price(_)
                | CheckoutError::Provider(_)
                | CheckoutError::Repository(_) => internal(),
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.classify();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb to the current Sentry scope.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of events
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("settlement", "Order created", Some(&[("order_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartline_core::ProductId;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order".to_string());
        assert_eq!(err.to_string(), "Not found: order");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = render(AppError::Conflict("Product is already in cart".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, serde_json::json!({ "error": "Product is already in cart" }));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, body) = render(AppError::Database(RepositoryError::DataCorruption(
            "row 42 is broken".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_auth_failures_are_uniform() {
        let (status, body) = render(AppError::Auth(AuthError::InvalidRefreshToken)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], UNAUTHORIZED_MESSAGE);

        let (status, _) = render(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_taxonomy_status_codes() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Auth(AuthError::EmailInUse), StatusCode::CONFLICT),
            (AppError::Auth(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (
                AppError::Database(RepositoryError::InsufficientStock(ProductId::generate())),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Database(RepositoryError::NotFound), StatusCode::NOT_FOUND),
            (AppError::Checkout(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(render(err).await.0, expected);
        }
    }
}
