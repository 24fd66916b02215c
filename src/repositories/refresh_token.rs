//! RefreshTokenRepository - persisted refresh tokens (hashes only)

use crate::entities::RefreshToken;
use chrono::{DateTime, Utc};
use sqlx::{Error, SqlitePool};
use tracing::{debug, info, instrument, warn};

pub struct RefreshTokenRepository {
    connection_pool: SqlitePool,
}

impl RefreshTokenRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    #[instrument(skip(self, token_hash))]
    pub async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, Error> {
        debug!("Storing refresh token");
        sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(&self.connection_pool)
        .await
    }

    #[instrument(skip(self, token_hash))]
    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, Error> {
        sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Revoke `old_hash` pointing it to its successor and store the successor.
    /// Fails with `RowNotFound` when the old token was revoked concurrently.
    #[instrument(skip(self, old_hash, new_hash))]
    pub async fn rotate(
        &self,
        user_id: i64,
        old_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = ?, replaced_by_hash = ?
            WHERE token_hash = ? AND user_id = ? AND revoked_at IS NULL
            "#,
        )
        .bind(now)
        .bind(new_hash)
        .bind(old_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            warn!("Refresh token already revoked, rotation aborted");
            return Err(Error::RowNotFound);
        }

        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(new_hash)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Refresh token rotated");
        Ok(token)
    }

    /// Revoke one token; no-op when already revoked or unknown
    #[instrument(skip(self, token_hash))]
    pub async fn revoke(&self, token_hash: &str) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE token_hash = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(token_hash)
        .execute(&self.connection_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every active token of a user, returns how many were revoked
    #[instrument(skip(self))]
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.connection_pool)
        .await?;

        info!("Revoked {} refresh tokens", result.rows_affected());
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::CreateUserDTO;
    use crate::entities::RefreshTokenState;
    use crate::repositories::{Create, UserRepository, test_pool};
    use chrono::Duration;

    async fn setup() -> (RefreshTokenRepository, i64) {
        let pool = test_pool().await;
        let user = UserRepository::new(pool.clone())
            .create(&CreateUserDTO {
                email: "r@example.com".to_string(),
                password_hash: "x".to_string(),
                first_name: "R".to_string(),
                last_name: "T".to_string(),
                email_confirmed: true,
            })
            .await
            .unwrap();
        (RefreshTokenRepository::new(pool), user.user_id)
    }

    #[tokio::test]
    async fn rotation_links_old_token_to_new_one() {
        let (repo, user_id) = setup().await;
        let expires = Utc::now() + Duration::days(7);
        repo.create(user_id, "old", expires).await.unwrap();

        let new = repo.rotate(user_id, "old", "new", expires).await.unwrap();
        assert_eq!(new.state(Utc::now()), RefreshTokenState::Active);

        let old = repo.find_by_hash("old").await.unwrap().unwrap();
        assert_eq!(old.state(Utc::now()), RefreshTokenState::Revoked);
        assert_eq!(old.replaced_by_hash.as_deref(), Some("new"));

        // a second rotation of the same token must fail
        assert!(matches!(
            repo.rotate(user_id, "old", "newer", expires).await,
            Err(Error::RowNotFound)
        ));
    }

    #[tokio::test]
    async fn revoke_all_only_counts_active_tokens() {
        let (repo, user_id) = setup().await;
        let expires = Utc::now() + Duration::days(7);
        repo.create(user_id, "a", expires).await.unwrap();
        repo.create(user_id, "b", expires).await.unwrap();
        assert!(repo.revoke("a").await.unwrap());
        assert!(!repo.revoke("a").await.unwrap());

        assert_eq!(repo.revoke_all_for_user(user_id).await.unwrap(), 1);
    }
}
