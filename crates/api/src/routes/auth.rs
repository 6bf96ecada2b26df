//! Session route handlers.
//!
//! The access token travels in the JSON body; the refresh token only ever
//! travels in an http-only cookie scoped to the refresh endpoint.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use cartline_core::{Email, UserId, UserRole};

use super::ApiJson;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{SessionGrant, SessionService, SignInInput, SignUpInput};
use crate::services::tokens::REFRESH_TOKEN_TTL_SECS;
use crate::state::AppState;

/// Name of the refresh token cookie.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Path the refresh cookie is scoped to.
pub const REFRESH_COOKIE_PATH: &str = "/auth/refresh";

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: UserId,
    pub email: Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

fn session_service(state: &AppState) -> SessionService<'_> {
    SessionService::new(state.users(), state.refresh_tokens(), state.tokens())
}

fn refresh_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, value))
        .http_only(true)
        .secure(state.config().secure_cookies())
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .max_age(time::Duration::seconds(REFRESH_TOKEN_TTL_SECS))
        .build()
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    grant: SessionGrant,
) -> (CookieJar, Json<SessionResponse>) {
    set_sentry_user(&grant.user.id);
    let jar = jar.add(refresh_cookie(state, grant.refresh_token));

    (
        jar,
        Json(SessionResponse {
            access_token: grant.access_token,
            user: grant.user,
        }),
    )
}

/// Register an account and start a session.
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<SignUpRequest>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>)> {
    let grant = session_service(&state)
        .sign_up(SignUpInput {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await?;

    let (jar, body) = start_session(&state, jar, grant);
    Ok((StatusCode::CREATED, jar, body))
}

/// Start a session with email and password.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<SignInRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let grant = session_service(&state)
        .sign_in(SignInInput {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(start_session(&state, jar, grant))
}

/// Issue a new access token from the refresh cookie.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<AccessTokenResponse>> {
    let presented = jar
        .get(REFRESH_COOKIE_NAME)
        .map(Cookie::value)
        .filter(|value| !value.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let grant = session_service(&state).refresh(presented).await?;

    Ok(Json(AccessTokenResponse {
        access_token: grant.access_token,
    }))
}

/// Revoke the caller's refresh token and clear the cookie.
pub async fn sign_out(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    session_service(&state).sign_out(&claims).await?;
    clear_sentry_user();

    let removal = Cookie::build(REFRESH_COOKIE_NAME)
        .path(REFRESH_COOKIE_PATH)
        .build();

    Ok((
        jar.remove(removal),
        Json(MessageResponse {
            message: "Signed out",
        }),
    ))
}

/// Identity carried by the caller's access token.
pub async fn me(RequireAuth(claims): RequireAuth) -> Json<MeResponse> {
    Json(MeResponse {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}
