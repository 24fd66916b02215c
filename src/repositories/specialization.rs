//! SpecializationRepository - global reference data seeded by the migrations

use super::Read;
use crate::entities::Specialization;
use sqlx::{Error, SqlitePool};
use tracing::instrument;

pub struct SpecializationRepository {
    connection_pool: SqlitePool,
}

impl SpecializationRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Specialization>, Error> {
        sqlx::query_as::<_, Specialization>("SELECT * FROM specializations ORDER BY name")
            .fetch_all(&self.connection_pool)
            .await
    }
}

impl Read<Specialization, i64> for SpecializationRepository {
    async fn read(&self, id: &i64) -> Result<Option<Specialization>, Error> {
        sqlx::query_as::<_, Specialization>(
            "SELECT * FROM specializations WHERE specialization_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}
