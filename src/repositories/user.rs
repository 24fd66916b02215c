//! UserRepository - accounts

use super::{Create, Read, Update};
use crate::dtos::{CreateUserDTO, UpdateUserDTO};
use crate::entities::User;
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

pub struct UserRepository {
    connection_pool: SqlitePool,
}

impl UserRepository {
    pub fn new(connection_pool: SqlitePool) -> UserRepository {
        Self { connection_pool }
    }

    /// Email lookup is case-insensitive (`COLLATE NOCASE` on the column)
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        debug!("Finding user by email");
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(user)
    }
}

impl Create<User, CreateUserDTO> for UserRepository {
    #[instrument(skip(self, data), fields(email = %data.email))]
    async fn create(&self, data: &CreateUserDTO) -> Result<User, Error> {
        debug!("Creating new user");
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, email_confirmed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.email_confirmed)
        .bind(now)
        .bind(now)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(user)
    }
}

impl Read<User, i64> for UserRepository {
    #[instrument(skip(self))]
    async fn read(&self, id: &i64) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await?;

        Ok(user)
    }
}

impl Update<User, UpdateUserDTO, i64> for UserRepository {
    #[instrument(skip(self, data))]
    async fn update(&self, id: &i64, data: &UpdateUserDTO) -> Result<User, Error> {
        debug!("Updating user");
        // Build dynamic query only for provided fields
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE users SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(password_hash) = &data.password_hash {
            query_builder.push(", password_hash = ").push_bind(password_hash);
        }
        if let Some(first_name) = &data.first_name {
            query_builder.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = &data.last_name {
            query_builder.push(", last_name = ").push_bind(last_name);
        }
        if let Some(email_confirmed) = data.email_confirmed {
            query_builder.push(", email_confirmed = ").push_bind(email_confirmed);
        }

        query_builder.push(" WHERE user_id = ").push_bind(id);
        query_builder.push(" RETURNING *");

        query_builder
            .build_query_as::<User>()
            .fetch_one(&self.connection_pool)
            .await
    }
}
