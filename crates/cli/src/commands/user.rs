//! User management commands.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `CARTLINE_USER_PASSWORD` - Password for `user create`

use cartline_api::db::{PgUserRepository, RepositoryError, UserRepository, create_pool};
use cartline_api::models::NewUser;
use cartline_api::services::auth::{AuthError, credentials};
use cartline_core::{Email, UserRole};
use thiserror::Error;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid role: {0}. Valid roles: customer, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Create a user with the given role.
///
/// # Errors
///
/// Returns `UserError` for invalid input, a taken email or a database
/// failure.
pub async fn create(
    email: &str,
    name: &str,
    role: &str,
    password: String,
) -> Result<(), UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))?;
    credentials::validate_password(&password)?;

    let database_url =
        super::database_url().map_err(|_| UserError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;
    let users = PgUserRepository::new(pool);

    let password_hash = credentials::hash_secret(password).await?;
    let user = users
        .create(&NewUser {
            name: name.trim().to_owned(),
            email: email.clone(),
            password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(email.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}
