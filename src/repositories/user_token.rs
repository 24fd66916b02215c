//! UserTokenRepository - single use email confirmation / password reset tokens

use crate::entities::{TokenPurpose, UserToken};
use chrono::{DateTime, Utc};
use sqlx::{Error, SqlitePool};
use tracing::{debug, instrument};

pub struct UserTokenRepository {
    connection_pool: SqlitePool,
}

impl UserTokenRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Store a new token, consuming the older unused ones of the same purpose
    #[instrument(skip(self, token_hash))]
    pub async fn issue(
        &self,
        user_id: i64,
        purpose: TokenPurpose,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<UserToken, Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE user_tokens SET consumed_at = ?
            WHERE user_id = ? AND purpose = ? AND consumed_at IS NULL
            "#,
        )
        .bind(now)
        .bind(user_id)
        .bind(purpose)
        .execute(&mut *tx)
        .await?;

        let token = sqlx::query_as::<_, UserToken>(
            r#"
            INSERT INTO user_tokens (user_id, purpose, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .bind(token_hash)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Issued {:?} token", purpose);
        Ok(token)
    }

    #[instrument(skip(self, token_hash))]
    pub async fn find(
        &self,
        user_id: i64,
        purpose: TokenPurpose,
        token_hash: &str,
    ) -> Result<Option<UserToken>, Error> {
        sqlx::query_as::<_, UserToken>(
            "SELECT * FROM user_tokens WHERE user_id = ? AND purpose = ? AND token_hash = ?",
        )
        .bind(user_id)
        .bind(purpose)
        .bind(token_hash)
        .fetch_optional(&self.connection_pool)
        .await
    }

    /// Mark a token as used; false when it was already consumed
    #[instrument(skip(self))]
    pub async fn consume(&self, token_id: i64) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE user_tokens SET consumed_at = ? WHERE token_id = ? AND consumed_at IS NULL",
        )
        .bind(Utc::now())
        .bind(token_id)
        .execute(&self.connection_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
