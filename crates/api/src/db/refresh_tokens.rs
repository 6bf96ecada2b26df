//! Postgres refresh-token repository.
//!
//! `refresh_token.user_id` is both primary key and foreign key, so the
//! database itself guarantees one active token per user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cartline_core::UserId;

use super::{RefreshTokenRepository, RepositoryError, conflict_on_unique};
use crate::models::RefreshTokenRecord;

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    user_id: Uuid,
    token_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            token_hash: row.token_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for `refresh_token` rows.
#[derive(Debug, Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<RefreshTokenRecord, RepositoryError> {
        let row: RefreshTokenRow = sqlx::query_as(
            r"
            INSERT INTO refresh_token (user_id, token_hash)
            VALUES ($1, $2)
            RETURNING user_id, token_hash, created_at, updated_at
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "refresh token already exists"))?;

        Ok(row.into())
    }

    async fn find_by_user_id(
        &self,
        user_id: UserId,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            r"
            SELECT user_id, token_hash, created_at, updated_at
            FROM refresh_token
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn replace(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<RefreshTokenRecord, RepositoryError> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            r"
            UPDATE refresh_token
            SET token_hash = $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, token_hash, created_at, updated_at
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM refresh_token WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
